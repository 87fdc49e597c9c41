//! Recording adapters that capture interactions to cassettes.

pub mod generation_model;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::cassette::format::RecordedError;
use crate::cassette::recorder::{write_cassette, CassetteRecorder};
use crate::error::GenerateError;

impl From<&GenerateError> for RecordedError {
    fn from(err: &GenerateError) -> Self {
        match err {
            GenerateError::Api { status, message } => {
                Self::Api { status: *status, message: message.clone() }
            }
            other => Self::Message(other.to_string()),
        }
    }
}

/// Record a `Result<T, GenerateError>` interaction using the Ok/Err JSON
/// convention and rewrite the cassette on disk.
///
/// The recorder stays locked until the write finishes so cassettes land in
/// recording order. The write itself runs on the blocking pool.
///
/// Recording never changes the outcome of the call it observes, so failures
/// here are logged and otherwise ignored.
pub(crate) async fn record_result<T, I>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
    result: &Result<T, GenerateError>,
) where
    T: Serialize,
    I: Serialize,
{
    let output_json = match result {
        Ok(v) => serde_json::to_value(v).map(|inner| serde_json::json!({ "Ok": inner })),
        Err(e) => serde_json::to_value(RecordedError::from(e))
            .map(|inner| serde_json::json!({ "Err": inner })),
    };
    let (input_json, output_json) = match (serde_json::to_value(input), output_json) {
        (Ok(input), Ok(output)) => (input, output),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, port, method, "Failed to serialize interaction for cassette");
            return;
        }
    };

    let mut guard = recorder.lock().await;
    guard.record(port, method, input_json, output_json);
    let path = guard.path().to_path_buf();
    let cassette = guard.snapshot();
    let written =
        tokio::task::spawn_blocking(move || write_cassette(&path, &cassette).map(|()| path)).await;
    drop(guard);

    match written {
        Ok(Ok(path)) => tracing::debug!(path = %path.display(), "Cassette updated"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to write cassette"),
        Err(e) => tracing::warn!(error = %e, "Cassette write task failed"),
    }
}
