//! On-disk cassette format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded session of port interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Human-readable session name.
    pub name: String,
    /// When the session was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Commit the recording was made from.
    pub commit: String,
    /// Interactions in recording order.
    pub interactions: Vec<Interaction>,
}

/// One call through a port and what it returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in the recording.
    pub seq: u64,
    /// Port name (e.g. `"generation_model"`).
    pub port: String,
    /// Method name (e.g. `"predict"`).
    pub method: String,
    /// Serialized input.
    pub input: serde_json::Value,
    /// Serialized result, using the `{"Ok": ..}` / `{"Err": ..}` convention.
    pub output: serde_json::Value,
}

/// A failed call as stored under `Err`.
///
/// Remote errors keep their status and bare message so a replay answers
/// exactly as the live call did. Older cassettes hold a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordedError {
    /// A remote error with its status code.
    Api {
        /// HTTP status code.
        status: u16,
        /// Bare error message.
        message: String,
    },
    /// Any other failure, as its display text.
    Message(String),
}
