use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking locally synthesized ids that the backend has not confirmed.
pub const PROVISIONAL_PREFIX: &str = "temp-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bookmark {
    /// Whether this record carries a locally generated id awaiting a
    /// backend-assigned durable one.
    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_PREFIX)
    }
}

/// Connectivity of the realtime change feed, shown in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedStatus {
    Connecting,
    Connected,
    #[default]
    Disconnected,
}

impl FeedStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FeedStatus::Connecting => "Connecting...",
            FeedStatus::Connected => "Live sync active",
            FeedStatus::Disconnected => "Disconnected",
        }
    }
}
