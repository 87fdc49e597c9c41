//! Replaying adapters that serve recorded interactions from cassettes.

pub mod generation_model;

use std::sync::{Arc, Mutex};

use crate::cassette::format::RecordedError;
use crate::cassette::replayer::CassetteReplayer;
use crate::error::GenerateError;

impl From<RecordedError> for GenerateError {
    fn from(recorded: RecordedError) -> Self {
        match recorded {
            RecordedError::Api { status, message } => Self::Api { status, message },
            RecordedError::Message(message) => Self::Api { status: 0, message },
        }
    }
}

/// Retrieve the next recorded output for a given port and method.
///
/// # Errors
///
/// Returns an error if the cassette has no more interactions or its lock is
/// poisoned.
pub(crate) fn next_output(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    port: &str,
    method: &str,
) -> Result<serde_json::Value, String> {
    let mut guard = replayer.lock().map_err(|e| format!("Replayer lock poisoned: {e}"))?;
    guard.next_interaction(port, method).map(|interaction| interaction.output.clone())
}

/// Deserialize a replayed output using the Ok/Err convention.
///
/// The outer error means the recorded output itself is unreadable.
///
/// # Errors
///
/// Returns an error if the output does not match `T` or `RecordedError`.
pub(crate) fn replay_result<T: serde::de::DeserializeOwned>(
    output: serde_json::Value,
) -> Result<Result<T, RecordedError>, String> {
    if let Some(err_val) = output.get("Err").or_else(|| output.get("err")) {
        let recorded = serde_json::from_value(err_val.clone())
            .map_err(|e| format!("Unreadable recorded error: {e}"))?;
        return Ok(Err(recorded));
    }
    let ok_val = output.get("Ok").or_else(|| output.get("ok")).unwrap_or(&output);
    serde_json::from_value(ok_val.clone())
        .map(Ok)
        .map_err(|e| format!("Unreadable recorded output: {e}"))
}
