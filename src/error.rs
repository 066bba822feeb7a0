//! Error types for the attendance bot.

/// Top-level error type for the attendance bot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration error (missing credential, unresolvable channel, bad times).
    #[error("config error: {0}")]
    Config(String),

    /// Chat platform request failed (network, HTTP status, bad payload).
    #[error("transport error: {0}")]
    Transport(String),

    /// The prompt message backing a day's record can no longer be read.
    #[error("attendance record unavailable: {0}")]
    RecordUnavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BotError>;
