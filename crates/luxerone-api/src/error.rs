//! Error types for the luxerOne client

use thiserror::Error;

pub type LuxerOneResult<T> = Result<T, LuxerOneError>;

#[derive(Debug, Error)]
pub enum LuxerOneError {
    /// Login was refused
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The session token is no longer accepted; log in again
    #[error("session token expired")]
    TokenExpired,

    /// An authenticated call was made before `login`
    #[error("not logged in")]
    NotLoggedIn,

    /// The service answered with an error
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request did not complete or the body could not be decoded
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl LuxerOneError {
    pub fn is_token_expired(&self) -> bool {
        matches!(self, LuxerOneError::TokenExpired)
    }

    /// True when the service could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        match self {
            LuxerOneError::Transport(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }
}
