//! Record/replay of model interactions for offline, deterministic runs.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;
