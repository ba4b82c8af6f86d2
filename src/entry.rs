//! Tracking records: the HTTP payload and the immutable log entry.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Field separator in the persisted log line.
pub const FIELD_SEPARATOR: &str = " - ";

/// Tracking payload posted by a web front-end.
///
/// Carries everything the front-end knows about the visit; the timestamp is
/// deliberately absent and is stamped server-side at enqueue to avoid
/// client clock skew.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPayload {
    pub url: String,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub language_tag: Option<String>,
}

/// Immutable record of one tracked request.
///
/// Created once per request, consumed exactly once by the file writer; after
/// formatting it has no further identity.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub referrer: Option<String>,
    pub action: Option<String>,
    pub session_id: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    pub language_tag: Option<String>,
}

impl LogEntry {
    /// Build an entry from a payload, stamping the current wall-clock time.
    pub fn from_payload(payload: TrackingPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            url: payload.url,
            referrer: payload.referrer,
            action: payload.action,
            session_id: payload.session_id,
            user_agent: payload.user_agent,
            user_id: payload.user_id,
            language_tag: payload.language_tag,
        }
    }

    /// Format the entry as a single delimited text line (no trailing newline).
    ///
    /// Absent optional fields render as empty text between separators, so
    /// every line has the same number of fields.
    pub fn format_line(&self) -> String {
        [
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.user_id.clone().unwrap_or_default(),
            self.url.clone(),
            self.referrer.clone().unwrap_or_default(),
            self.action.clone().unwrap_or_default(),
            self.language_tag.clone().unwrap_or_default(),
            self.session_id.clone().unwrap_or_default(),
            self.user_agent.clone().unwrap_or_default(),
        ]
        .join(FIELD_SEPARATOR)
    }
}
