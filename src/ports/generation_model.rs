//! Generation model port for the remote reference-image model.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::config::HfToken;
use crate::error::GenerateError;
use crate::params::RefTask;

/// An uploaded reference image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    /// Original file name, as uploaded.
    pub file_name: String,
    /// MIME type of the image (e.g., `"image/png"`).
    pub mime_type: String,
    /// Raw image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// The full parameter set sent to the model, named as the model names them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// First reference image.
    pub ref_image1: ReferenceImage,
    /// Second reference image. Always present; duplicated from the first when
    /// the user supplied only one.
    pub ref_image2: ReferenceImage,
    /// Task tag of the first reference image.
    pub ref_task1: RefTask,
    /// Task tag of the second reference image.
    pub ref_task2: RefTask,
    /// Text prompt.
    pub prompt: String,
    /// Opaque seed text; `"-1"` asks for a random seed.
    pub seed: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Reference resolution.
    pub ref_res: u32,
    /// Sampling steps.
    pub num_steps: u32,
    /// Guidance scale.
    pub guidance: f64,
    /// True CFG scale.
    pub true_cfg: f64,
    /// True CFG start step.
    pub cfg_start_step: u32,
    /// True CFG end step.
    pub cfg_end_step: u32,
    /// Negative prompt.
    pub neg_prompt: String,
    /// Negative guidance scale.
    pub neg_guidance: f64,
    /// First step guidance.
    pub first_step_guidance: f64,
}

/// The model's raw output: an ordered sequence of heterogeneous values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Output values in endpoint order.
    pub data: Vec<serde_json::Value>,
}

/// Boxed future type returned by [`GenerationModel::predict`].
pub type PredictFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawPrediction, GenerateError>> + Send + 'a>>;

/// Invokes the remote generation model.
pub trait GenerationModel: Send + Sync {
    /// Run one prediction with the given credential.
    fn predict(&self, credential: &HfToken, request: &ModelRequest) -> PredictFuture<'_>;
}

/// Serde helper for serializing `Vec<u8>` as base64 strings in cassettes.
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64 string.
    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        serializer.serialize_str(&encoded)
    }

    /// Deserialize base64 string to bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
