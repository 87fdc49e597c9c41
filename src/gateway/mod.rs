//! The generation gateway: an HTTP service that keeps the credential on
//! the server and forwards generation requests to the model.

pub mod form_data;
pub mod handler;
pub mod prediction;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::adapters::live::gateway::GENERATE_PATH;
use crate::config::{HfToken, ServerConfig};
use crate::ports::GenerationModel;

/// Shared state available to handlers via `State<AppState>`.
///
/// Built once at startup and never mutated; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Validated credential, if one is configured.
    pub credential: Option<HfToken>,
    /// The model port.
    pub model: Arc<dyn GenerationModel>,
    /// Space name used in messages and logs.
    pub space: Arc<str>,
    /// Bounds the number of model calls in flight.
    pub limiter: Arc<Semaphore>,
}

impl AppState {
    /// Assemble the handler state.
    #[must_use]
    pub fn new(
        credential: Option<HfToken>,
        model: Arc<dyn GenerationModel>,
        space: &str,
        max_in_flight: usize,
    ) -> Self {
        Self {
            credential,
            model,
            space: Arc::from(space),
            limiter: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

/// Build the router.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route(GENERATE_PATH, post(handler::generate_image))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
