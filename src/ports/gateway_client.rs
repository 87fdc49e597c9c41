//! Gateway client port used by the form controller.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::error::GenerateError;

/// A file part of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFile {
    /// Form field name.
    pub field: &'static str,
    /// File name sent with the part.
    pub file_name: String,
    /// MIME type sent with the part.
    pub mime_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

/// A multipart submission, in the order the parts are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationSubmission {
    /// File parts.
    pub files: Vec<SubmittedFile>,
    /// Text parts as `(field, value)` pairs.
    pub text: Vec<(&'static str, String)>,
}

#[cfg(test)]
impl GenerationSubmission {
    /// Value of a text part, if sent.
    #[must_use]
    pub fn text_value(&self, field: &str) -> Option<&str> {
        self.text.iter().find(|(name, _)| *name == field).map(|(_, value)| value.as_str())
    }

    /// A file part, if sent.
    #[must_use]
    pub fn file(&self, field: &str) -> Option<&SubmittedFile> {
        self.files.iter().find(|f| f.field == field)
    }
}

/// JSON body returned by the gateway. Either the result fields or `error`
/// is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBody {
    /// Location of the generated image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Seed the model actually used.
    #[serde(default)]
    pub used_seed: Option<String>,
    /// Error description.
    #[serde(default)]
    pub error: Option<String>,
}

/// The gateway's answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body.
    pub body: ReplyBody,
}

impl GatewayReply {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Boxed future type returned by [`GatewayClient::submit`].
pub type SubmitFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GatewayReply, GenerateError>> + Send + 'a>>;

/// Boxed future type returned by [`GatewayClient::fetch_image`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, GenerateError>> + Send + 'a>>;

/// Talks to the generation gateway on behalf of the form.
pub trait GatewayClient: Send + Sync {
    /// Send one submission and return the gateway's reply.
    fn submit(&self, submission: &GenerationSubmission) -> SubmitFuture<'_>;

    /// Fetch the bytes of a generated image directly from where it is hosted.
    fn fetch_image(&self, url: &str) -> FetchFuture<'_>;
}
