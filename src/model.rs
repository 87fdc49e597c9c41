//! Remote model identity: Hugging Face Space ids and their hosts.

use std::fmt;
use std::str::FromStr;

/// The Space that hosts the DreamO model.
pub const DEFAULT_SPACE: &str = "ByteDance/DreamO";

/// The named endpoint invoked on the Space.
pub const DEFAULT_ENDPOINT: &str = "/generate_image";

/// A Hugging Face Space identifier of the form `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceId {
    owner: String,
    name: String,
}

impl SpaceId {
    /// The public host serving the Space's Gradio app.
    ///
    /// Spaces are served from `https://<owner>-<name>.hf.space`, lowercased,
    /// with every character outside `[a-z0-9]` replaced by a hyphen.
    #[must_use]
    pub fn host_url(&self) -> String {
        let subdomain: String = format!("{}-{}", self.owner, self.name)
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("https://{subdomain}.hf.space")
    }
}

impl FromStr for SpaceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self { owner: owner.to_string(), name: name.to_string() })
            }
            _ => Err(format!("Invalid Space id '{s}'. Expected 'owner/name'.")),
        }
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Resolve the base URL of the Gradio app: an explicit override wins,
/// otherwise the Space's public host.
///
/// # Errors
///
/// Returns an error if no override is given and the Space id is malformed.
pub fn resolve_base_url(space: &str, base_url: Option<&str>) -> Result<String, String> {
    if let Some(url) = base_url {
        return Ok(url.trim_end_matches('/').to_string());
    }
    Ok(space.parse::<SpaceId>()?.host_url())
}

/// Normalize an endpoint name to its bare form (`"/generate_image"` → `"generate_image"`).
#[must_use]
pub fn endpoint_name(endpoint: &str) -> &str {
    endpoint.trim_start_matches('/')
}
