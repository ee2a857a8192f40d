use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of the sync history shown on the page and persisted locally.
/// Newest entries sit at the front of the stored list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Remote account id to @-mention in the rendered row, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(message: impl Into<String>, author_id: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            author_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_id_is_omitted_when_absent() {
        let entry = HistoryEntry::new("synced 3 assets", None);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("author_id"));

        let entry = HistoryEntry::new("synced 3 assets", Some("712020:abc".into()));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("712020:abc"));
    }
}
