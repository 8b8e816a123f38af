//! Immutable description of a file handle.

use serde::{Deserialize, Serialize};

/// Name used when a file is created without one.
pub const DEFAULT_NAME: &str = "file";

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// Snapshot of a file's identity.
///
/// A state is never edited in place: transitions build a new value, so a
/// reader holding one never sees a half-applied update. The file is dirty
/// while `url` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl FileState {
    pub fn builder() -> FileStateBuilder {
        FileStateBuilder::default()
    }

    /// Start a builder pre-filled with this state's fields.
    pub fn to_builder(&self) -> FileStateBuilder {
        FileStateBuilder {
            name: Some(self.name.clone()),
            mime_type: self.mime_type.clone(),
            url: self.url.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.url.is_none()
    }

    pub(crate) fn with_url(&self, url: String) -> Self {
        self.to_builder().url(url).build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileStateBuilder {
    name: Option<String>,
    mime_type: Option<String>,
    url: Option<String>,
}

impl FileStateBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn build(self) -> FileState {
        FileState {
            name: self.name.unwrap_or_else(default_name),
            mime_type: self.mime_type,
            url: self.url,
        }
    }
}
