use keyflow_models::ValidationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccessError>;

/// Failure taxonomy of the grant/revoke workflow. Validation and gateway
/// failures happen before any store mutation and are safe to retry; a store
/// failure happens after the upstream already acknowledged the change, so
/// retrying may duplicate remote state.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Access control servers not available, try again")]
    UpstreamUnavailable { status: Option<u16>, detail: String },

    /// The upstream call succeeded but the audit-log write did not. There is
    /// no compensating revoke; the gap must be reconciled out-of-band.
    #[error("Access log write failed")]
    StoreUnavailable(#[source] keyflow_database::DatabaseError),

    #[error("An error occurred while processing the request")]
    Processing(String),
}

impl From<keyflow_database::DatabaseError> for AccessError {
    fn from(err: keyflow_database::DatabaseError) -> Self {
        AccessError::StoreUnavailable(err)
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        AccessError::Processing(err.to_string())
    }
}
