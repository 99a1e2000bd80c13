use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Debug, Error)]
pub enum NeoError {
    // --- Hard dependency errors (the request cannot proceed) ---
    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("Cache store error: {0}")]
    CacheStore(String),

    // --- Soft dependency errors (the LLM or router can adapt) ---
    #[error("Source query error: {0}")]
    SourceQuery(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    // --- Operational errors ---
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl NeoError {
    /// Whether this error is from a hard dependency (fails the request).
    pub fn is_hard_dependency(&self) -> bool {
        matches!(self, Self::LlmApi(_) | Self::Config(_))
    }

    /// Whether this error is from a soft dependency (surfaced to the LLM as
    /// a structured tool result instead of failing the request).
    pub fn is_soft_dependency(&self) -> bool {
        matches!(
            self,
            Self::SourceQuery(_) | Self::Embedding(_) | Self::CacheStore(_) | Self::Timeout(_)
        )
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, NeoError>;
