use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistable reference to a saved file.
///
/// What an application stores in its own rows to find the file again later;
/// a clean handle can be rebuilt from it without touching the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Remote object id
    pub key: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub url: String,
    pub created_at: DateTime<Utc>,
}
