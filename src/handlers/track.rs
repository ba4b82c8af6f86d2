use axum::{extract::State, http::StatusCode, Json};

use super::AppState;
use crate::entry::TrackingPayload;

/// Handle `POST /track`.
///
/// Enqueues the payload and answers immediately with 204: ingestion is
/// fire-and-forget and never blocks on file I/O. Producers do not observe
/// write failures; delivery is best-effort by design.
pub async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<TrackingPayload>,
) -> StatusCode {
    state.writer.enqueue(payload);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TrackingConfig, whitelist::WhitelistStore, writer::LogWriter};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ingest_responds_no_content() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, guard) = LogWriter::spawn(&TrackingConfig {
            log_directory: dir.path().to_path_buf(),
            file_prefix: "tracking-".to_string(),
            rotation_interval_minutes: 60,
        });
        let whitelist =
            Arc::new(WhitelistStore::load(dir.path().join("whitelist.txt")).unwrap());
        let state = AppState { whitelist, writer };

        let payload = TrackingPayload {
            url: "/home".to_string(),
            referrer: None,
            action: Some("pageview".to_string()),
            session_id: None,
            user_agent: None,
            user_id: None,
            language_tag: None,
        };

        let status = ingest(State(state), Json(payload)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // Shutdown drains the enqueued entry to disk.
        guard.shutdown().await;
        let mut dir_entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut found = false;
        while let Some(entry) = dir_entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("tracking-") {
                let contents = tokio::fs::read_to_string(entry.path()).await.unwrap();
                assert!(contents.contains(" - /home - "));
                found = true;
            }
        }
        assert!(found, "expected a tracking log file");
    }
}
