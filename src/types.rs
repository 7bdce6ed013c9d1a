//! Shared error types for medigate

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for the gateway binary
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the document store seams consumed by the core
/// (role directory lookups and counter transactions).
///
/// `Conflict` marks a single failed transactional attempt that is safe to
/// retry with fresh state; `Unavailable` is terminal for the request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
