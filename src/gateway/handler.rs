//! The generation handler and its error responses.

use std::error::Error as _;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use super::form_data::{FormFields, UploadedFile};
use super::prediction::{kind, Prediction};
use super::AppState;
use crate::error::GenerateError;
use crate::params::{field, parse_task, GenerationParams, InvalidField, RANDOM_SEED};
use crate::ports::ModelRequest;

/// Successful generation response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    /// Location of the generated image.
    pub image_url: String,
    /// Seed the model used, when it reported one.
    pub used_seed: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Everything that ends a generation request without an image.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The body is not a readable multipart form, or is larger than allowed.
    #[error("Invalid multipart payload: {message}")]
    Multipart {
        /// Status reported by the multipart extractor.
        status: StatusCode,
        /// Extractor error text.
        message: String,
    },

    /// No first reference image was uploaded.
    #[error("Reference Image 1 is required")]
    MissingReferenceImage,

    /// No prompt was sent.
    #[error("Prompt is required")]
    MissingPrompt,

    /// A parameter could not be translated.
    #[error("{0}")]
    InvalidField(InvalidField),

    /// No usable credential is configured.
    #[error("Missing or invalid Hugging Face token. Please add HF_TOKEN to .env.local file.")]
    MissingCredential,

    /// The model answered with a result the gateway cannot read.
    #[error("Failed to process image: Could not extract image URL from API response.")]
    Extraction,

    /// The model call failed.
    #[error("{0}")]
    Remote(String),
}

impl GatewayError {
    /// Wrap a failed model call, keeping its message or falling back to a
    /// generic one naming the Space.
    #[must_use]
    pub fn remote(err: &GenerateError, space: &str) -> Self {
        Self::Remote(
            err.message()
                .unwrap_or_else(|| format!("An unexpected error occurred calling {space}.")),
        )
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Multipart { status, .. } => *status,
            Self::MissingReferenceImage
            | Self::MissingPrompt
            | Self::InvalidField(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::Extraction | Self::Remote(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<InvalidField> for GatewayError {
    fn from(err: InvalidField) -> Self {
        Self::InvalidField(err)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// `POST /api/generate-image`: validate, translate, call the model once,
/// and reshape its result.
///
/// # Errors
///
/// Returns a [`GatewayError`] response on the first failed step.
pub async fn generate_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerateResponse>, GatewayError> {
    let mut multipart = multipart
        .map_err(|e| GatewayError::Multipart { status: e.status(), message: e.body_text() })?;
    let form = FormFields::read(&mut multipart)
        .await
        .map_err(|e| GatewayError::Multipart { status: e.status(), message: e.body_text() })?;

    let image1 = form.image(field::REF_IMAGE1).ok_or(GatewayError::MissingReferenceImage)?;
    let prompt = form
        .text(field::PROMPT)
        .filter(|p| !p.trim().is_empty())
        .ok_or(GatewayError::MissingPrompt)?;

    let Some(credential) = state.credential.as_ref() else {
        tracing::error!("Missing or invalid Hugging Face token. Add HF_TOKEN=hf_your_token to .env.local");
        return Err(GatewayError::MissingCredential);
    };

    let image2 = form.image(field::REF_IMAGE2);
    let request = translate(&form, image1, image2, prompt)?;

    tracing::info!(
        space = %state.space,
        ref_image1 = %image1.describe(),
        ref_image2 = %image2.map_or_else(|| "not provided".to_string(), UploadedFile::describe),
        ref_task1 = %request.ref_task1,
        ref_task2 = %request.ref_task2,
        prompt = %request.prompt,
        seed = %request.seed,
        width = request.width,
        height = request.height,
        num_steps = request.num_steps,
        "Dispatching generation request"
    );

    let raw = {
        let _permit = state
            .limiter
            .acquire()
            .await
            .map_err(|_| GatewayError::Remote("Gateway is shutting down".to_string()))?;
        state.model.predict(credential, &request).await
    }
    .map_err(|err| {
        tracing::error!(error = %err, "Call to the model failed");
        let mut cause = err.source();
        while let Some(inner) = cause {
            tracing::error!(cause = %inner, "Underlying cause");
            cause = inner.source();
        }
        tracing::error!(details = ?err, "Full error");
        GatewayError::remote(&err, &state.space)
    })?;

    tracing::debug!(
        elements = raw.data.len(),
        kinds = %raw.data.iter().map(kind).collect::<Vec<_>>().join(", "),
        "Model result received"
    );

    let prediction = Prediction::extract(&raw).map_err(|e| {
        tracing::error!(
            error = %e,
            data = %serde_json::to_string(&raw.data).unwrap_or_default(),
            "Could not extract image URL from model result"
        );
        GatewayError::Extraction
    })?;

    tracing::debug!(
        path = ?prediction.image.path,
        auxiliary = ?prediction.auxiliary.as_ref().map(kind),
        "Extracted prediction"
    );
    tracing::info!(image_url = %prediction.image.url, used_seed = ?prediction.seed, "Generation succeeded");
    Ok(Json(GenerateResponse { image_url: prediction.image.url, used_seed: prediction.seed }))
}

/// Build the model request. A missing second reference is filled with the
/// first reference and its task, since the endpoint requires both slots.
fn translate(
    form: &FormFields,
    image1: &UploadedFile,
    image2: Option<&UploadedFile>,
    prompt: &str,
) -> Result<ModelRequest, InvalidField> {
    let lookup = |name: &str| form.text(name);
    let params = GenerationParams::from_form(lookup)?;

    let ref_image1 = image1.to_reference(field::REF_IMAGE1);
    let ref_task1 = parse_task(lookup, field::REF_TASK1)?;
    let (ref_image2, ref_task2) = match image2 {
        Some(image2) => (image2.to_reference(field::REF_IMAGE2), parse_task(lookup, field::REF_TASK2)?),
        None => (ref_image1.clone(), ref_task1),
    };

    let seed = form
        .text(field::SEED)
        .filter(|s| !s.is_empty())
        .unwrap_or(RANDOM_SEED)
        .to_string();

    Ok(ModelRequest {
        ref_image1,
        ref_image2,
        ref_task1,
        ref_task2,
        prompt: prompt.to_string(),
        seed,
        width: params.width,
        height: params.height,
        ref_res: params.ref_res,
        num_steps: params.num_steps,
        guidance: params.guidance,
        true_cfg: params.true_cfg,
        cfg_start_step: params.cfg_start_step,
        cfg_end_step: params.cfg_end_step,
        neg_prompt: form.text(field::NEG_PROMPT).unwrap_or_default().to_string(),
        neg_guidance: params.neg_guidance,
        first_step_guidance: params.first_step_guidance,
    })
}
