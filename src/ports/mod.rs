//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the application core and an
//! external system. Implementations live in `src/adapters/`.

pub mod gateway_client;
pub mod generation_model;

pub use gateway_client::{GatewayClient, GatewayReply, GenerationSubmission};
pub use generation_model::{GenerationModel, ModelRequest, RawPrediction, ReferenceImage};
