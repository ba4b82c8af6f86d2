//! Ingestion queue and rotating file writer.
//!
//! Producer/consumer split: request handlers format entries at enqueue time
//! and push lines into an unbounded channel (never blocking, never failing);
//! a single background task drains the channel once per second into the
//! active log file, rotating it when its age exceeds the configured
//! interval.
//!
//! Delivery is at-most-once: an I/O error during a cycle is logged and the
//! cycle retries on the next tick, but lines already popped from the queue
//! are lost. Producers never observe failures.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::TrackingConfig;
use crate::entry::{LogEntry, TrackingPayload};
use crate::metrics;

/// Drain cycle tick.
const DRAIN_TICK: Duration = Duration::from_secs(1);

/// Producer-side handle to the ingestion queue.
///
/// Cheap to clone; handlers keep one in the application state.
#[derive(Clone)]
pub struct LogWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl LogWriter {
    /// Spawn the background writer task.
    ///
    /// Returns the producer handle and a guard used to shut the task down
    /// with a final synchronous drain.
    pub fn spawn(cfg: &TrackingConfig) -> (Self, WriterGuard) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        let sink = FileSink::new(cfg, Utc::now());
        let handle = tokio::spawn(writer_task(rx, sink, token.clone()));

        (
            Self { tx },
            WriterGuard {
                shutdown: token,
                handle,
            },
        )
    }

    /// Enqueue one tracking payload (non-blocking, fire-and-forget).
    ///
    /// The entry is stamped with the current wall-clock time and formatted
    /// here, at enqueue, so a slow drain cannot skew the recorded time.
    pub fn enqueue(&self, payload: TrackingPayload) {
        let entry = LogEntry::from_payload(payload);
        // Only fails when the consumer is gone, i.e. during shutdown.
        let _ = self.tx.send(entry.format_line());
    }
}

/// Owns the background task; shutting down drains the queue one last time.
pub struct WriterGuard {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl WriterGuard {
    /// Stop the writer after its current cycle, then run one final drain
    /// so every already-enqueued line reaches disk before exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Log writer task panicked during shutdown");
        }
    }
}

/// Background consumer: tick-driven rotate-then-drain loop.
///
/// `MissedTickBehavior::Skip` means a late cycle is skipped, never run
/// concurrently with itself.
async fn writer_task(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sink: FileSink,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval(DRAIN_TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_cycle(&mut sink, &mut rx).await;
            }
            _ = token.cancelled() => {
                // Final drain; the file handle is flushed and closed by scope.
                run_cycle(&mut sink, &mut rx).await;
                break;
            }
        }
    }

    info!("Log writer task shut down");
}

/// One drain cycle: rotate if due, snapshot-drain the queue, append, flush.
async fn run_cycle(sink: &mut FileSink, rx: &mut mpsc::UnboundedReceiver<String>) {
    sink.rotate_if_due(Utc::now());

    // Snapshot drain: pop until empty. Lines enqueued mid-drain are picked
    // up next cycle.
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }

    let depth = lines.len();
    let start = std::time::Instant::now();

    match sink.append(&lines).await {
        Ok(()) => {
            if depth > 0 {
                debug!(
                    count = depth,
                    duration_ms = start.elapsed().as_millis() as u64,
                    file = %sink.active_path().display(),
                    "Flushed tracking log batch"
                );
            }
            metrics::record_drain_cycle(depth, start.elapsed());
        }
        Err(e) => {
            // Retried on the next tick; the popped lines are lost
            // (at-most-once delivery, by contract).
            error!(
                error = %e,
                count = depth,
                file = %sink.active_path().display(),
                "Failed to write tracking log batch"
            );
        }
    }
}

/// Rotation state: the active file path and when it was opened.
struct FileSink {
    directory: PathBuf,
    file_prefix: String,
    rotation_interval: chrono::Duration,
    file_opened_at: DateTime<Utc>,
    active_path: PathBuf,
}

impl FileSink {
    fn new(cfg: &TrackingConfig, now: DateTime<Utc>) -> Self {
        let mut sink = Self {
            directory: cfg.log_directory.clone(),
            file_prefix: cfg.file_prefix.clone(),
            rotation_interval: chrono::Duration::minutes(i64::from(
                cfg.rotation_interval_minutes,
            )),
            file_opened_at: now,
            active_path: PathBuf::new(),
        };
        sink.active_path = sink.path_for(now);
        sink
    }

    /// Rotate when the active file's age reaches the interval. Elapsed time
    /// is direct timestamp subtraction; no calendar arithmetic.
    fn rotate_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if now - self.file_opened_at < self.rotation_interval {
            return false;
        }
        self.file_opened_at = now;
        self.active_path = self.path_for(now);
        metrics::record_rotation();
        info!(file = %self.active_path.display(), "Rotated tracking log file");
        true
    }

    /// `<prefix><digit-filtered minute timestamp>.log`.
    ///
    /// Minute resolution means two rotations within the same minute land on
    /// the same path and the second appends to the first — known
    /// limitation, kept as documented behavior.
    fn path_for(&self, now: DateTime<Utc>) -> PathBuf {
        let stamp: String = now
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        self.directory
            .join(format!("{}{}.log", self.file_prefix, stamp))
    }

    fn active_path(&self) -> &PathBuf {
        &self.active_path
    }

    /// Append all lines to the active file with a single flush.
    async fn append(&self, lines: &[String]) -> std::io::Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.directory).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.active_path)
            .await?;

        for line in lines {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, interval_minutes: u32) -> TrackingConfig {
        TrackingConfig {
            log_directory: dir.path().to_path_buf(),
            file_prefix: "tracking-".to_string(),
            rotation_interval_minutes: interval_minutes,
        }
    }

    fn payload(url: &str) -> TrackingPayload {
        TrackingPayload {
            url: url.to_string(),
            referrer: None,
            action: None,
            session_id: None,
            user_agent: None,
            user_id: None,
            language_tag: None,
        }
    }

    #[test]
    fn test_file_name_is_digit_filtered_minute_stamp() {
        let dir = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let sink = FileSink::new(&test_config(&dir, 60), now);

        assert_eq!(
            sink.active_path().file_name().unwrap().to_str().unwrap(),
            "tracking-202603140926.log"
        );
    }

    #[test]
    fn test_rotation_by_timestamp_subtraction() {
        let dir = TempDir::new().unwrap();
        let opened = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let mut sink = FileSink::new(&test_config(&dir, 1), opened);
        let first_path = sink.active_path().clone();

        // 59 s elapsed: not due yet.
        assert!(!sink.rotate_if_due(opened + chrono::Duration::seconds(59)));
        assert_eq!(sink.active_path(), &first_path);

        // >= 1 simulated minute: rotates to a different path.
        assert!(sink.rotate_if_due(opened + chrono::Duration::seconds(60)));
        assert_ne!(sink.active_path(), &first_path);
    }

    #[test]
    fn test_rotation_crosses_month_boundary() {
        let dir = TempDir::new().unwrap();
        // The legacy minute-of-month check broke exactly here.
        let opened = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 30).unwrap();
        let mut sink = FileSink::new(&test_config(&dir, 1), opened);

        let next_month = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 30).unwrap();
        assert!(sink.rotate_if_due(next_month));
    }

    #[test]
    fn test_rotation_interval_not_reached() {
        let dir = TempDir::new().unwrap();
        let opened = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let mut sink = FileSink::new(&test_config(&dir, 60), opened);

        assert!(!sink.rotate_if_due(opened + chrono::Duration::minutes(59)));
        assert!(sink.rotate_if_due(opened + chrono::Duration::minutes(60)));
    }

    #[tokio::test]
    async fn test_drain_writes_entries_in_enqueue_order() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::new(&test_config(&dir, 60), Utc::now());
        let (tx, mut rx) = mpsc::unbounded_channel();

        for url in ["/a", "/b", "/c"] {
            let entry = LogEntry::from_payload(payload(url));
            tx.send(entry.format_line()).unwrap();
        }

        run_cycle(&mut sink, &mut rx).await;

        let contents = tokio::fs::read_to_string(sink.active_path()).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(" - /a - "));
        assert!(lines[1].contains(" - /b - "));
        assert!(lines[2].contains(" - /c - "));
    }

    #[tokio::test]
    async fn test_items_enqueued_mid_drain_wait_for_next_cycle() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::new(&test_config(&dir, 60), Utc::now());
        let (tx, mut rx) = mpsc::unbounded_channel();

        tx.send("first".to_string()).unwrap();
        run_cycle(&mut sink, &mut rx).await;

        tx.send("second".to_string()).unwrap();
        run_cycle(&mut sink, &mut rx).await;

        let contents = tokio::fs::read_to_string(sink.active_path()).await.unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_empty_cycle_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::new(&test_config(&dir, 60), Utc::now());
        let (_tx, mut rx) = mpsc::unbounded_channel::<String>();

        run_cycle(&mut sink, &mut rx).await;
        assert!(!sink.active_path().exists());
    }

    #[tokio::test]
    async fn test_io_error_is_swallowed_and_logged() {
        let dir = TempDir::new().unwrap();
        let mut cfg = test_config(&dir, 60);
        // A directory we cannot create files under.
        cfg.log_directory = PathBuf::from("/proc/webtrack-does-not-exist");
        let mut sink = FileSink::new(&cfg, Utc::now());
        let (tx, mut rx) = mpsc::unbounded_channel();

        tx.send("lost line".to_string()).unwrap();
        // Must not panic; producers never observe the failure.
        run_cycle(&mut sink, &mut rx).await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_entries() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir, 60);
        let (writer, guard) = LogWriter::spawn(&cfg);

        for url in ["/x", "/y", "/z"] {
            writer.enqueue(payload(url));
        }
        guard.shutdown().await;

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let file = entries.next_entry().await.unwrap().expect("log file written");
        let contents = tokio::fs::read_to_string(file.path()).await.unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
