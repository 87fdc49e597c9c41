//! Collecting multipart form fields.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;

use crate::params::field;
use crate::ports::ReferenceImage;

/// A file part received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// File name sent by the client.
    pub file_name: Option<String>,
    /// Content type sent by the client.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl UploadedFile {
    /// Short description for logs: `name (N bytes)`.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} ({} bytes)", self.file_name.as_deref().unwrap_or("None"), self.data.len())
    }

    /// Convert into the model's reference image, naming it after `fallback_name`
    /// when the client sent no file name and sniffing the MIME type when the
    /// client sent none.
    #[must_use]
    pub fn to_reference(&self, fallback_name: &str) -> ReferenceImage {
        let mime_type = self.content_type.clone().unwrap_or_else(|| {
            image::guess_format(&self.data)
                .map_or("application/octet-stream", |f| f.to_mime_type())
                .to_string()
        });
        ReferenceImage {
            file_name: self.file_name.clone().unwrap_or_else(|| fallback_name.to_string()),
            mime_type,
            data: self.data.to_vec(),
        }
    }
}

/// All fields of one submission. The first occurrence of a name wins.
#[derive(Debug, Default)]
pub struct FormFields {
    text: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormFields {
    /// Drain a multipart stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is malformed.
    pub async fn read(multipart: &mut Multipart) -> Result<Self, MultipartError> {
        let mut fields = Self::default();
        while let Some(part) = multipart.next_field().await? {
            let Some(name) = part.name().map(str::to_string) else {
                continue;
            };
            let is_file = part.file_name().is_some()
                || name == field::REF_IMAGE1
                || name == field::REF_IMAGE2;

            if is_file {
                let file_name = part.file_name().map(str::to_string);
                let content_type = part.content_type().map(str::to_string);
                let data = part.bytes().await?;
                fields.files.entry(name).or_insert(UploadedFile { file_name, content_type, data });
            } else {
                let value = part.text().await?;
                fields.text.entry(name).or_insert(value);
            }
        }
        Ok(fields)
    }

    /// A text field, if sent.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }

    /// A non-empty file field, if sent.
    #[must_use]
    pub fn image(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).filter(|f| !f.data.is_empty())
    }
}
