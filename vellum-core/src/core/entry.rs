use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single journal entry.
///
/// Entries are serialized to JSON and encrypted before they ever touch disk;
/// the serialized form must round-trip all four fields exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Positive, unique, monotonically assigned per journal. Never reused
    /// after deletion and never reassigned on edit.
    pub id: u64,
    /// The user's text.
    pub content: String,
    /// Fixed at creation.
    pub created_at: DateTime<Utc>,
    /// Advanced on every edit; equals `created_at` for a fresh entry.
    pub updated_at: DateTime<Utc>,
}
