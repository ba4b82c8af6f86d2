//! File-backed whitelist of subnets.
//!
//! Lookups read a copy-on-write snapshot (`ArcSwap`) and never block on
//! mutations. Mutations are serialized by a mutex that spans both the
//! in-memory update and the persistence write, so a concurrent lookup can
//! never observe a half-applied change. The file is rewritten in full on
//! every mutation, which is fine at whitelist scale.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::error::AppError;
use crate::subnet::Subnet;

/// Mutable set of subnets with file persistence.
///
/// Uniqueness and removal work on the canonical `address/prefix` form.
pub struct WhitelistStore {
    entries: ArcSwap<Vec<Subnet>>,
    // Held across in-memory update + persistence write.
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl WhitelistStore {
    /// Load the whitelist from `path`.
    ///
    /// A malformed line is skipped with a warning rather than aborting
    /// startup; a missing file starts an empty whitelist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => parse_lines(&contents, &path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Whitelist file not found, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            entries = entries.len(),
            "Whitelist loaded"
        );

        Ok(Self {
            entries: ArcSwap::from_pointee(entries),
            write_lock: Mutex::new(()),
            path,
        })
    }

    /// Add a subnet unless an entry with the same canonical form exists.
    /// Returns the updated canonical list.
    pub fn add(&self, text: &str) -> Result<Vec<String>, AppError> {
        let subnet = Subnet::parse(text)?;

        let _guard = self.write_lock.lock().expect("whitelist lock poisoned");
        let current = self.entries.load_full();

        if current.iter().any(|existing| *existing == subnet) {
            return Ok(canonical_list(&current));
        }

        let mut updated = current.as_ref().clone();
        updated.push(subnet);
        self.persist(&updated)?;
        self.entries.store(Arc::new(updated));

        Ok(self.list())
    }

    /// Remove the entry that exactly matches `text`.
    ///
    /// A bare address widens to its full-width canonical form first, so
    /// removing `"1.2.3.4"` removes the stored `"1.2.3.4/32"` and nothing
    /// else. Returns the updated canonical list.
    pub fn remove(&self, text: &str) -> Result<Vec<String>, AppError> {
        // Parsing widens bare addresses to /32 or /128; removal is then a
        // plain exact match on address + prefix.
        let target = Subnet::parse(text)?;

        let _guard = self.write_lock.lock().expect("whitelist lock poisoned");
        let current = self.entries.load_full();

        let updated: Vec<Subnet> = current
            .iter()
            .filter(|existing| **existing != target)
            .cloned()
            .collect();

        if updated.len() != current.len() {
            self.persist(&updated)?;
            self.entries.store(Arc::new(updated));
        }

        Ok(self.list())
    }

    /// True iff any stored subnet contains `addr` — union semantics, first
    /// match wins, no precedence among overlapping ranges.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.entries
            .load()
            .iter()
            .any(|subnet| subnet.contains(addr))
    }

    /// Text-based lookup; malformed text fails closed.
    pub fn contains_text(&self, text: &str) -> bool {
        match text.parse::<IpAddr>() {
            Ok(addr) => self.contains(&addr),
            Err(_) => false,
        }
    }

    /// Canonical strings in insertion order.
    pub fn list(&self) -> Vec<String> {
        canonical_list(&self.entries.load())
    }

    /// Re-read the persisted file and swap the snapshot (SIGHUP handler).
    pub fn reload(&self) -> Result<usize, AppError> {
        let _guard = self.write_lock.lock().expect("whitelist lock poisoned");
        let contents = std::fs::read_to_string(&self.path)?;
        let entries = parse_lines(&contents, &self.path);
        let count = entries.len();
        self.entries.store(Arc::new(entries));
        Ok(count)
    }

    /// Rewrite the whole persisted file, one canonical string per line.
    /// Called with the write lock held.
    fn persist(&self, entries: &[Subnet]) -> Result<(), AppError> {
        let mut contents = entries
            .iter()
            .map(Subnet::canonical_form)
            .collect::<Vec<_>>()
            .join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

fn parse_lines(contents: &str, path: &Path) -> Vec<Subnet> {
    let mut entries: Vec<Subnet> = Vec::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Subnet::parse(line) {
            Ok(subnet) => {
                if !entries.contains(&subnet) {
                    entries.push(subnet);
                }
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line,
                    error = %e,
                    "Skipping malformed whitelist line"
                );
            }
        }
    }

    entries
}

fn canonical_list(entries: &[Subnet]) -> Vec<String> {
    entries.iter().map(Subnet::canonical_form).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn store_with(lines: &[&str]) -> (WhitelistStore, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        let store = WhitelistStore::load(file.path()).unwrap();
        (store, file)
    }

    #[test]
    fn test_load_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = WhitelistStore::load(dir.path().join("absent.txt")).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let (store, _file) = store_with(&["10.0.0.0/24", "not-a-subnet", "10.0.0.0/99", "::1"]);
        assert_eq!(store.list(), vec!["10.0.0.0/24", "::1/128"]);
    }

    #[test]
    fn test_add_widens_and_persists_canonical_form() {
        let (store, file) = store_with(&[]);
        store.add("10.0.0.1").unwrap();

        assert_eq!(store.list(), vec!["10.0.0.1/32"]);
        let persisted = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(persisted, "10.0.0.1/32\n");
    }

    #[test]
    fn test_add_deduplicates_by_canonical_form() {
        let (store, _file) = store_with(&[]);
        store.add("10.0.0.1").unwrap();
        let list = store.add("10.0.0.1/32").unwrap();
        assert_eq!(list, vec!["10.0.0.1/32"]);
    }

    #[test]
    fn test_add_rejects_malformed_text() {
        let (store, _file) = store_with(&[]);
        assert!(matches!(
            store.add("10.0.0.0/33"),
            Err(AppError::InvalidFormat(_))
        ));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_remove_widens_bare_address_to_exact_match() {
        let (store, file) = store_with(&["10.0.0.1/32", "10.0.0.1/24"]);
        let list = store.remove("10.0.0.1").unwrap();

        // Only the full-width entry goes; the /24 sharing the base address stays.
        assert_eq!(list, vec!["10.0.0.1/24"]);
        let persisted = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(persisted, "10.0.0.1/24\n");
    }

    #[test]
    fn test_remove_explicit_prefix() {
        let (store, _file) = store_with(&["10.0.0.0/24", "10.0.0.0/16"]);
        let list = store.remove("10.0.0.0/16").unwrap();
        assert_eq!(list, vec!["10.0.0.0/24"]);
    }

    #[test]
    fn test_remove_absent_entry_is_a_no_op() {
        let (store, _file) = store_with(&["10.0.0.0/24"]);
        let list = store.remove("192.168.0.1").unwrap();
        assert_eq!(list, vec!["10.0.0.0/24"]);
    }

    #[test]
    fn test_contains_union_semantics() {
        let (store, _file) = store_with(&["192.168.1.0/24"]);
        assert!(store.contains(&"192.168.1.5".parse().unwrap()));
        assert!(!store.contains(&"192.168.2.5".parse().unwrap()));
    }

    #[test]
    fn test_contains_text_fails_closed_on_garbage() {
        let (store, _file) = store_with(&["0.0.0.0/0"]);
        assert!(store.contains_text("203.0.113.9"));
        assert!(!store.contains_text("definitely-not-an-ip"));
        assert!(!store.contains_text(""));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let (store, _file) = store_with(&[]);
        store.add("10.0.0.0/8").unwrap();
        store.add("192.168.1.0/24").unwrap();
        store.add("172.16.0.0/12").unwrap();
        assert_eq!(
            store.list(),
            vec!["10.0.0.0/8", "192.168.1.0/24", "172.16.0.0/12"]
        );
    }

    #[test]
    fn test_reload_picks_up_external_edits() {
        let (store, file) = store_with(&["10.0.0.0/24"]);
        std::fs::write(file.path(), "172.16.0.0/12\nbroken-line\n").unwrap();

        let count = store.reload().unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.list(), vec!["172.16.0.0/12"]);
    }

    #[test]
    fn test_lookups_race_free_with_mutations() {
        let (store, _file) = store_with(&["10.0.0.0/8"]);
        let store = Arc::new(store);

        let reader = {
            let store = store.clone();
            std::thread::spawn(move || {
                let addr: IpAddr = "10.1.2.3".parse().unwrap();
                for _ in 0..1000 {
                    // The /8 never goes away, so this must always hold.
                    assert!(store.contains(&addr));
                }
            })
        };

        for i in 0..100 {
            store.add(&format!("192.168.{i}.0/24")).unwrap();
        }
        reader.join().unwrap();
    }
}
