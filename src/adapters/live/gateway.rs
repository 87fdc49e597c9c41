//! Live adapter that submits forms to a running generation gateway.

use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::error::GenerateError;
use crate::ports::gateway_client::{
    FetchFuture, GatewayClient, GatewayReply, GenerationSubmission, ReplyBody, SubmitFuture,
};

/// Path of the generation endpoint on the gateway.
pub const GENERATE_PATH: &str = "/api/generate-image";

/// Gateway client speaking multipart over HTTP.
pub struct HttpGatewayClient {
    client: Client,
    endpoint: String,
}

impl HttpGatewayClient {
    /// Create a client for the gateway at `server` (e.g. `http://localhost:3000`).
    #[must_use]
    pub fn new(server: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}{GENERATE_PATH}", server.trim_end_matches('/')),
        }
    }
}

fn build_form(submission: &GenerationSubmission) -> Result<Form, GenerateError> {
    let mut form = Form::new();
    for file in &submission.files {
        let part = Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)?;
        form = form.part(file.field, part);
    }
    for (field, value) in &submission.text {
        form = form.text(*field, value.clone());
    }
    Ok(form)
}

impl GatewayClient for HttpGatewayClient {
    fn submit(&self, submission: &GenerationSubmission) -> SubmitFuture<'_> {
        let form = build_form(submission);
        Box::pin(async move {
            let response = self.client.post(&self.endpoint).multipart(form?).send().await?;

            let status = response.status().as_u16();
            let text = response.text().await?;
            let body: ReplyBody = serde_json::from_str(&text).map_err(|e| GenerateError::Api {
                status,
                message: format!("Failed to parse gateway response: {e}"),
            })?;
            Ok(GatewayReply { status, body })
        })
    }

    fn fetch_image(&self, url: &str) -> FetchFuture<'_> {
        let url = url.to_string();
        Box::pin(async move {
            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(GenerateError::Api { status: status.as_u16(), message });
            }
            Ok(response.bytes().await?.to_vec())
        })
    }
}
