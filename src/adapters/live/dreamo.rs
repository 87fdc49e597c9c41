//! Live adapter for the DreamO Space, spoken over the Gradio HTTP API.
//!
//! A prediction takes three round trips: upload the reference images, queue
//! a call to the named endpoint, then read the call's event stream until it
//! completes or fails.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::HfToken;
use crate::error::GenerateError;
use crate::model::endpoint_name;
use crate::ports::generation_model::{
    GenerationModel, ModelRequest, PredictFuture, RawPrediction, ReferenceImage,
};

/// Live DreamO model reached through a Gradio app.
pub struct DreamoModel {
    client: Client,
    base_url: String,
    endpoint: String,
}

impl DreamoModel {
    /// Create a model client for the Gradio app at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        endpoint: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, GenerateError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
            endpoint: endpoint_name(endpoint).to_string(),
        })
    }

    async fn upload(
        &self,
        credential: &HfToken,
        image: &ReferenceImage,
    ) -> Result<String, GenerateError> {
        let part = Part::bytes(image.data.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)?;
        let response = self
            .client
            .post(format!("{}/gradio_api/upload", self.base_url))
            .bearer_auth(credential.expose())
            .multipart(Form::new().part("files", part))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GenerateError::Api { status: status.as_u16(), message: text });
        }

        let paths: Vec<String> = serde_json::from_str(&text).map_err(|e| GenerateError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse upload response: {e}"),
        })?;
        paths.into_iter().next().ok_or_else(|| GenerateError::Api {
            status: status.as_u16(),
            message: "Upload response listed no files".to_string(),
        })
    }

    async fn queue_call(&self, credential: &HfToken, data: Vec<Value>) -> Result<String, GenerateError> {
        let response = self
            .client
            .post(format!("{}/gradio_api/call/{}", self.base_url, self.endpoint))
            .bearer_auth(credential.expose())
            .json(&json!({ "data": data }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GenerateError::Api { status: status.as_u16(), message: text });
        }

        let queued: QueuedCall = serde_json::from_str(&text).map_err(|e| GenerateError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse call response: {e}"),
        })?;
        Ok(queued.event_id)
    }

    async fn await_result(
        &self,
        credential: &HfToken,
        event_id: &str,
    ) -> Result<Vec<Value>, GenerateError> {
        let response = self
            .client
            .get(format!("{}/gradio_api/call/{}/{event_id}", self.base_url, self.endpoint))
            .bearer_auth(credential.expose())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(GenerateError::Api { status: status.as_u16(), message: text });
        }
        parse_event_stream(&text)
    }
}

impl GenerationModel for DreamoModel {
    fn predict(&self, credential: &HfToken, request: &ModelRequest) -> PredictFuture<'_> {
        let credential = credential.clone();
        let request = request.clone();
        Box::pin(async move {
            let path1 = self.upload(&credential, &request.ref_image1).await?;
            let path2 = if request.ref_image2 == request.ref_image1 {
                path1.clone()
            } else {
                self.upload(&credential, &request.ref_image2).await?
            };
            tracing::debug!(%path1, %path2, "Reference images uploaded");

            let event_id = self.queue_call(&credential, call_data(&request, &path1, &path2)).await?;
            tracing::debug!(%event_id, endpoint = %self.endpoint, "Prediction queued");

            let data = self.await_result(&credential, &event_id).await?;
            Ok(RawPrediction { data })
        })
    }
}

/// Positional endpoint inputs, in the order the endpoint declares them.
fn call_data(request: &ModelRequest, path1: &str, path2: &str) -> Vec<Value> {
    vec![
        file_data(path1, &request.ref_image1),
        file_data(path2, &request.ref_image2),
        json!(request.ref_task1),
        json!(request.ref_task2),
        json!(request.prompt),
        json!(request.seed),
        json!(request.width),
        json!(request.height),
        json!(request.ref_res),
        json!(request.num_steps),
        json!(request.guidance),
        json!(request.true_cfg),
        json!(request.cfg_start_step),
        json!(request.cfg_end_step),
        json!(request.neg_prompt),
        json!(request.neg_guidance),
        json!(request.first_step_guidance),
    ]
}

fn file_data(path: &str, image: &ReferenceImage) -> Value {
    json!({
        "path": path,
        "orig_name": image.file_name,
        "mime_type": image.mime_type,
        "meta": { "_type": "gradio.FileData" },
    })
}

/// Read a Gradio event stream until its `complete` or `error` event.
///
/// An `error` event without details yields an empty message so callers can
/// substitute their own fallback.
fn parse_event_stream(body: &str) -> Result<Vec<Value>, GenerateError> {
    let mut event = "";
    for line in body.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            event = name.trim();
        } else if let Some(data) = line.strip_prefix("data:") {
            let data = data.trim();
            match event {
                "complete" => {
                    return serde_json::from_str(data).map_err(|e| GenerateError::Api {
                        status: 200,
                        message: format!("Failed to parse result data: {e}"),
                    });
                }
                "error" => {
                    return Err(GenerateError::Api { status: 200, message: error_message(data) });
                }
                _ => {}
            }
        }
    }
    Err(GenerateError::Api {
        status: 200,
        message: "Event stream ended without a result".to_string(),
    })
}

fn error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => ["error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        Ok(Value::Null) => String::new(),
        _ => data.to_string(),
    }
}

// --- Gradio API response types ---

#[derive(Deserialize)]
struct QueuedCall {
    event_id: String,
}
