use thiserror::Error;

/// Top-level error type for the reconciliation library.
///
/// Domain-level failures (status gates, amount mismatches) are NOT errors:
/// they are returned as a [`crate::api::ReconOutcome`] paired with an audit
/// record. This type covers infrastructure faults only; a catch-all at the
/// service boundary converts any of these into an OTHER-classified outcome
/// plus alarm, so a single order never aborts a batch sweep.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::migrate::MigrateError> for ReconError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        ReconError::Internal(format!("migration error: {error}"))
    }
}

impl From<config::ConfigError> for ReconError {
    fn from(error: config::ConfigError) -> Self {
        ReconError::Config(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ReconError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_default())
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");
        ReconError::InvalidInput(format!("validation failed: {fields}"))
    }
}

/// Result type alias for the library.
pub type ReconResult<T> = Result<T, ReconError>;
