use thiserror::Error;

/// Failure talking to the persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store query failed: {0}")]
    Query(String),
    #[error("Stored order {order_id} could not be encoded: {reason}")]
    Encoding { order_id: String, reason: String },
}

/// Per-message failures. None of these escape the ingest pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to parse order: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Order failed validation: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("Failed to persist order: {0}")]
    Persistence(#[from] StoreError),
}
