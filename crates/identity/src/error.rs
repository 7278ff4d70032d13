use thiserror::Error;

pub type ManagementResult<T> = Result<T, ManagementError>;

/// Failure of a Management API call.
///
/// These are **remote** failures; callers decide whether "not found" is an
/// error or an absent value.
#[derive(Debug, Error)]
pub enum ManagementError {
    /// The platform has no record for the requested id (HTTP 404).
    #[error("resource not found")]
    NotFound,

    /// The platform rejected the request.
    #[error("management API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// No usable access token.
    #[error("credential unavailable: {0}")]
    Credential(#[from] CredentialError),
}

impl ManagementError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ManagementError::NotFound)
    }
}

/// Failure to obtain or read the Management API access token.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No token has been obtained yet.
    #[error("no access token available")]
    Unavailable,

    /// The token endpoint could not be reached.
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token endpoint refused the client credentials.
    #[error("token endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },
}
