//! Error types for the WeChat MP credential manager

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WxError>;

/// Failure reported by a [`Fetcher`](crate::Fetcher) while retrieving a credential.
///
/// The refresh coordinator hands these back to its caller unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure, including timeouts and non-success HTTP statuses
    #[error("Network error: {0}")]
    Network(String),

    /// The platform answered with a non-zero error code
    #[error("Remote rejected request: errcode={code}, errmsg={message}")]
    RemoteRejected { code: i64, message: String },

    /// The platform answered, but the body could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum WxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown credential key: {0}")]
    InvalidKey(String),

    #[error("Credential fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}
