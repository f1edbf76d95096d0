//! Error types for validation and setup

use luxerone_api::LuxerOneError;
use thiserror::Error;

/// Why a set of credentials was not accepted
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid credentials")]
    InvalidAuth,

    #[error("cannot connect to luxerOne")]
    CannotConnect,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ValidationError {
    /// The form error key shown to the user
    pub fn form_key(&self) -> &'static str {
        match self {
            ValidationError::InvalidAuth => "invalid_auth",
            ValidationError::CannotConnect => "cannot_connect",
            ValidationError::Unknown(_) => "unknown",
        }
    }
}

impl From<LuxerOneError> for ValidationError {
    fn from(err: LuxerOneError) -> Self {
        if err.is_connectivity() {
            return ValidationError::CannotConnect;
        }
        match err {
            LuxerOneError::Authentication(_)
            | LuxerOneError::Api { .. }
            | LuxerOneError::TokenExpired => ValidationError::InvalidAuth,
            other => ValidationError::Unknown(other.to_string()),
        }
    }
}

/// Why a config entry could not be set up
#[derive(Debug, Error)]
pub enum SetupError {
    /// Stored credentials were refused; the user must re-authenticate
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The service was unreachable; setup may be retried later
    #[error("luxerOne not ready: {0}")]
    NotReady(String),

    /// The entry was unloaded while setup was in flight
    #[error("setup of entry {0} was cancelled")]
    Cancelled(String),

    #[error("entry {0} is already set up")]
    AlreadyLoaded(String),

    #[error("entry data is missing '{0}'")]
    MissingData(&'static str),

    #[error("cannot create entity: {0}")]
    Entity(#[from] ha_host::EntityIdError),
}

impl SetupError {
    /// Classify a client error raised while building the session
    pub fn from_client(err: LuxerOneError) -> Self {
        if err.is_connectivity() {
            SetupError::NotReady(err.to_string())
        } else {
            SetupError::AuthFailed(err.to_string())
        }
    }

    /// Whether the host should start a re-authentication flow
    pub fn requires_reauth(&self) -> bool {
        matches!(self, SetupError::AuthFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_errors_map_to_invalid_auth() {
        let err: ValidationError = LuxerOneError::Authentication("nope".into()).into();
        assert!(matches!(err, ValidationError::InvalidAuth));
        assert_eq!(err.form_key(), "invalid_auth");

        let err: ValidationError = LuxerOneError::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, ValidationError::InvalidAuth));

        let err: ValidationError = LuxerOneError::NotLoggedIn.into();
        assert_eq!(err.form_key(), "unknown");
    }

    #[test]
    fn test_setup_error_reauth() {
        let err = SetupError::from_client(LuxerOneError::Authentication("nope".into()));
        assert!(err.requires_reauth());
        assert!(!SetupError::NotReady("down".into()).requires_reauth());
    }
}
