//! Unified error type for dreamgate.

use thiserror::Error;

/// Errors that can occur while talking to the model host or the gateway.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A remote endpoint returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the remote side.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Image decoding or format conversion error.
    #[error("Image conversion error: {0}")]
    ImageConversion(String),

    /// The generation was refused or failed; the message is user-facing.
    #[error("{0}")]
    Rejected(String),

    /// A recorded cassette could not serve the interaction.
    #[error("Cassette error: {0}")]
    Cassette(String),
}

impl GenerateError {
    /// The most specific human-readable message carried by this error.
    ///
    /// Remote API errors yield the bare message from the remote side; every
    /// other variant yields its display form. Returns `None` when the message
    /// is blank.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let message = match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            None
        } else {
            Some(message)
        }
    }
}
