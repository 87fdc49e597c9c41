//! Service context that bundles the model port trait object.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::live::dreamo::DreamoModel;
use crate::adapters::recording::generation_model::RecordingGenerationModel;
use crate::adapters::replaying::generation_model::ReplayingGenerationModel;
use crate::cassette::config::load_cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::ModelConfig;
use crate::error::GenerateError;
use crate::model::resolve_base_url;
use crate::ports::GenerationModel;

/// How the gateway reaches the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMode {
    /// Call the remote Space.
    Live,
    /// Call the remote Space and record every interaction.
    Recording,
    /// Serve interactions from a cassette file.
    Replaying(String),
}

impl ModelMode {
    /// Pick the mode from `DREAMGATE_REPLAY` / `DREAMGATE_REC`.
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var("DREAMGATE_REPLAY") {
            return Self::Replaying(path);
        }
        if std::env::var("DREAMGATE_REC").is_ok_and(|v| v == "true" || v == "1") {
            return Self::Recording;
        }
        Self::Live
    }
}

/// Bundles all port trait objects into a single context.
pub struct ServiceContext {
    /// Generation model port.
    pub model: Arc<dyn GenerationModel>,
}

impl ServiceContext {
    /// Build the context for the given mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the model endpoint or cassette cannot be set up.
    pub fn for_mode(mode: &ModelMode, config: &ModelConfig) -> Result<Self, GenerateError> {
        match mode {
            ModelMode::Live => Self::live(config),
            ModelMode::Recording => Self::recording(config),
            ModelMode::Replaying(path) => Self::replaying(Path::new(path)),
        }
    }

    /// Create a live context for the configured Space.
    ///
    /// # Errors
    ///
    /// Returns an error if the Space id is malformed or the HTTP client
    /// cannot be built.
    pub fn live(config: &ModelConfig) -> Result<Self, GenerateError> {
        Ok(Self { model: Arc::new(Self::dreamo(config)?) })
    }

    fn dreamo(config: &ModelConfig) -> Result<DreamoModel, GenerateError> {
        let base_url = resolve_base_url(&config.space, config.base_url.as_deref())
            .map_err(GenerateError::Config)?;
        tracing::info!(space = %config.space, %base_url, endpoint = %config.endpoint, "Model endpoint resolved");
        DreamoModel::new(base_url, &config.endpoint, config.timeout_secs.map(Duration::from_secs))
    }

    /// Create a recording context that wraps the live adapter with a recorder.
    ///
    /// The cassette lands in `.dreamgate/cassettes/<timestamp>/` and is
    /// rewritten after every interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the live adapter cannot be created.
    pub fn recording(config: &ModelConfig) -> Result<Self, GenerateError> {
        let live = Self::dreamo(config)?;

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = std::path::PathBuf::from(".dreamgate/cassettes")
            .join(&timestamp)
            .join("generation_model.cassette.yaml");
        tracing::info!(path = %path.display(), "Recording model interactions");

        let recorder = Arc::new(tokio::sync::Mutex::new(CassetteRecorder::new(
            path,
            format!("{timestamp}-generation_model"),
            get_commit_hash(),
        )));
        let model = RecordingGenerationModel::new(Box::new(live), recorder);
        Ok(Self { model: Arc::new(model) })
    }

    /// Create a replaying context from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, GenerateError> {
        let replayer = load_cassette(path)
            .map_err(|e| GenerateError::Config(format!("Failed to load cassette: {e}")))?;
        tracing::info!(path = %path.display(), "Replaying model interactions");
        let model = ReplayingGenerationModel::new(Arc::new(Mutex::new(replayer)));
        Ok(Self { model: Arc::new(model) })
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HfToken;
    use crate::params::RefTask;
    use crate::ports::{ModelRequest, ReferenceImage};

    fn request() -> ModelRequest {
        let image =
            ReferenceImage { file_name: "a.png".into(), mime_type: "image/png".into(), data: vec![7] };
        ModelRequest {
            ref_image1: image.clone(),
            ref_image2: image,
            ref_task1: RefTask::Ip,
            ref_task2: RefTask::Ip,
            prompt: "a cat".into(),
            seed: "-1".into(),
            width: 768,
            height: 768,
            ref_res: 512,
            num_steps: 8,
            guidance: 1.0,
            true_cfg: 1.0,
            cfg_start_step: 0,
            cfg_end_step: 0,
            neg_prompt: String::new(),
            neg_guidance: 1.0,
            first_step_guidance: 0.0,
        }
    }

    #[test]
    fn live_context_rejects_bad_space() {
        let config = ModelConfig { space: "nonsense".into(), ..ModelConfig::default() };
        assert!(matches!(ServiceContext::live(&config), Err(GenerateError::Config(_))));
    }

    #[test]
    fn replaying_missing_cassette_fails() {
        let result = ServiceContext::replaying(Path::new("/nonexistent/cassette.yaml"));
        assert!(matches!(result, Err(GenerateError::Config(_))));
    }

    #[tokio::test]
    async fn replaying_context_serves_recorded_prediction() {
        let dir = std::env::temp_dir().join("dreamgate_context_replay_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("replay.cassette.yaml");
        std::fs::write(
            &path,
            "name: replay\nrecorded_at: \"2026-02-01T00:00:00Z\"\ncommit: test\ninteractions:\n  \
             - seq: 0\n    port: generation_model\n    method: predict\n    input: {}\n    \
             output:\n      Ok:\n        data:\n          - url: https://x/img.webp\n          \
             - []\n          - \"1234\"\n",
        )
        .unwrap();

        let ctx = ServiceContext::replaying(&path).unwrap();
        let token = HfToken::parse("hf_test").unwrap();
        let raw = ctx.model.predict(&token, &request()).await.unwrap();
        assert_eq!(raw.data[0]["url"], "https://x/img.webp");
        assert_eq!(raw.data[2], "1234");

        let err = ctx.model.predict(&token, &request()).await.unwrap_err();
        assert!(matches!(err, GenerateError::Cassette(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
