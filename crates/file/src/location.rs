/// Maps remote object ids to public file urls and back.
///
/// Urls have the form `{base_url}/{bucket}/{object_id}`; the object id may
/// itself contain `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    base_url: String,
    bucket: String,
}

impl RemoteLocation {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let bucket = bucket.into().trim_matches('/').to_string();
        Self { base_url, bucket }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn url_for(&self, object_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, object_id)
    }

    /// Recover the object id from a url built by [`url_for`](Self::url_for).
    ///
    /// Returns `None` for urls outside this bucket.
    pub fn object_id<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base_url.as_str())?
            .strip_prefix('/')?
            .strip_prefix(self.bucket.as_str())?
            .strip_prefix('/')
            .filter(|object_id| !object_id.is_empty())
    }
}
