//! Adapter implementations for port traits.
//!
//! - `live/` - Real HTTP implementations
//! - `recording/` - Record model interactions to cassettes
//! - `replaying/` - Replay model interactions from cassettes

pub mod live;
pub mod recording;
pub mod replaying;
