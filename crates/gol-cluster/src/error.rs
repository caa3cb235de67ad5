//! Cluster client errors.

/// Errors returned by a [`ClusterClient`](crate::ClusterClient).
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The API refused to create the resource (duplicate name, quota, schema).
    #[error("submission rejected ({status}): {message}")]
    Submission { status: u16, message: String },

    /// The resource is not visible yet (or no longer exists).
    #[error("resource not found")]
    NotFoundYet,

    /// Any other non-success answer from the API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced an HTTP answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with something we could not decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// Client could not be configured (token, CA, endpoint).
    #[error("client configuration error: {0}")]
    Config(String),
}

impl ClusterError {
    /// Returns true for the "resource not found" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFoundYet)
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClusterError::Decode(e.to_string())
        } else {
            ClusterError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Decode(e.to_string())
    }
}
