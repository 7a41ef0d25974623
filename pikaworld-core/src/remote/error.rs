//! Remote document service errors.

use std::time::Duration;

use thiserror::Error;

/// Errors from talking to the remote document service.
///
/// The sync coordinator logs and absorbs all of these.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Not signed in to the sync server")]
    Unauthenticated,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Connection(e.to_string())
        }
    }
}
