// Error types shared by every layer of the dashboard
//
// Library code returns `Result<T>`; the binaries wrap it in anyhow.

use thiserror::Error;

/// Why a form submission was rejected before any write happened
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("date is required")]
    MissingDate,

    #[error("date must be YYYY-MM-DD, got {0:?}")]
    InvalidDate(String),

    #[error("description is required")]
    MissingDescription,

    #[error("amount must be a positive number, got {0:?}")]
    InvalidAmount(String),

    #[error("unknown category {0:?}")]
    UnknownCategory(String),

    #[error("unknown payment method {0:?}")]
    UnknownPaymentMethod(String),

    #[error("invalid month key {0:?}, expected YYYY-MM")]
    InvalidMonth(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Message from the auth provider, shown to the user verbatim
    #[error("{0}")]
    Auth(String),

    #[error("Sign in to add expenses.")]
    NoSession,

    #[error("expense {0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_session_message_is_user_facing() {
        assert_eq!(Error::NoSession.to_string(), "Sign in to add expenses.");
    }

    #[test]
    fn test_auth_message_is_verbatim() {
        let err = Error::Auth("Invalid login credentials".to_string());
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[test]
    fn test_validation_converts_into_error() {
        let err: Error = ValidationError::MissingDescription.into();
        assert!(matches!(err, Error::Validation(ValidationError::MissingDescription)));
    }
}
