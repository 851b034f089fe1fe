//! Error types for the avatar speech relay.

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Chat backend request or reply stream error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Avatar engine error.
    #[error("avatar error: {0}")]
    Avatar(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RelayError>;
