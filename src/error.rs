use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GmailError>;

#[derive(Debug, Error)]
pub enum GmailError {
    /// No client secret file, so no way to start a consent flow.
    #[error("OAuth client configuration not found at {}: {source}", .path.display())]
    AuthConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OAuth authorization failed: {0}")]
    AuthFlow(String),
    #[error("Gmail API returned {status}: {message}")]
    RemoteApi { status: u16, message: String },
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed Gmail response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for GmailError {
    fn from(err: serde_json::Error) -> Self {
        GmailError::Malformed(err.to_string())
    }
}
