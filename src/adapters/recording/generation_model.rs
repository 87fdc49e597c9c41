//! Recording adapter for the `GenerationModel` port.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::HfToken;
use crate::ports::generation_model::{GenerationModel, ModelRequest, PredictFuture};

/// Records model interactions while delegating to an inner implementation.
///
/// Only the request is recorded; the credential never reaches the cassette.
pub struct RecordingGenerationModel {
    inner: Box<dyn GenerationModel>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingGenerationModel {
    /// Creates a new recording model wrapping the given implementation.
    pub fn new(inner: Box<dyn GenerationModel>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl GenerationModel for RecordingGenerationModel {
    fn predict(&self, credential: &HfToken, request: &ModelRequest) -> PredictFuture<'_> {
        let credential = credential.clone();
        let request = request.clone();
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = self.inner.predict(&credential, &request).await;
            record_result(&recorder, "generation_model", "predict", &request, &result).await;
            result
        })
    }
}
