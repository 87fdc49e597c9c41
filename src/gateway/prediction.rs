//! Typed view of the model's positional result.
//!
//! The endpoint returns `[generated image, preprocessing outputs, used seed]`.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::ports::RawPrediction;

/// The generated image as described by the model host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedFile {
    /// Public location of the image.
    pub url: String,
    /// Path of the file on the model host.
    #[serde(default)]
    pub path: Option<String>,
}

/// A validated model result.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The generated image.
    pub image: GeneratedFile,
    /// Auxiliary outputs (preprocessed references), passed over untouched.
    pub auxiliary: Option<Value>,
    /// The seed the model actually used.
    pub seed: Option<String>,
}

/// Why a model result could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// The result holds no elements.
    #[error("result data is empty")]
    Empty,
    /// The first element is not an object.
    #[error("result element 0 is {0}, expected an object")]
    NotAnObject(&'static str),
    /// The first element is an object without a non-empty string `url`.
    #[error("result element 0 has no non-empty string `url`")]
    MissingUrl,
}

impl Prediction {
    /// Read the generated image and seed out of a raw result.
    ///
    /// # Errors
    ///
    /// Returns an error unless element 0 is an object carrying a non-empty
    /// string `url`.
    pub fn extract(raw: &RawPrediction) -> Result<Self, ExtractionError> {
        let first = raw.data.first().ok_or(ExtractionError::Empty)?;
        if !first.is_object() {
            return Err(ExtractionError::NotAnObject(kind(first)));
        }
        let image: GeneratedFile =
            serde_json::from_value(first.clone()).map_err(|_| ExtractionError::MissingUrl)?;
        if image.url.is_empty() {
            return Err(ExtractionError::MissingUrl);
        }

        let seed = raw.data.get(2).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string);

        Ok(Self { image, auxiliary: raw.data.get(1).cloned(), seed })
    }
}

/// JSON type name of a value, for diagnostics.
#[must_use]
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
