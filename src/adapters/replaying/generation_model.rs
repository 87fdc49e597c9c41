//! Replaying adapter for the `GenerationModel` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::config::HfToken;
use crate::error::GenerateError;
use crate::ports::generation_model::{
    GenerationModel, ModelRequest, PredictFuture, RawPrediction,
};

/// Serves recorded model results from a cassette.
pub struct ReplayingGenerationModel {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingGenerationModel {
    /// Create a replaying model backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl GenerationModel for ReplayingGenerationModel {
    fn predict(&self, _credential: &HfToken, _request: &ModelRequest) -> PredictFuture<'_> {
        let output = next_output(&self.replayer, "generation_model", "predict");
        Box::pin(async move {
            let output = output.map_err(GenerateError::Cassette)?;
            replay_result::<RawPrediction>(output)
                .map_err(GenerateError::Cassette)?
                .map_err(GenerateError::from)
        })
    }
}
