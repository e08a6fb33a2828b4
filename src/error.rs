//! Error types shared across the crate.
//!
//! Every failure in this layer resolves to a user-visible notice and a
//! return to a stable idle state; nothing here is fatal to the process and
//! there are no automatic retries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevoiceError {
    /// Input rejected locally before any request is made (e.g. empty text).
    #[error("{0}")]
    Validation(String),

    /// Transport or connectivity failure talking to the backend.
    #[error("could not reach the backend: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered but reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// The speech host failed while synthesizing or playing audio.
    #[error("playback error: {0}")]
    Playback(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, RevoiceError>;
