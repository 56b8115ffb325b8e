//! Fadebox library — ephemeral file-sharing backend.
//!
//! This crate provides the core components for running an ephemeral
//! file-sharing service: signed upload/download URL issuance against an
//! object store, a key-value metadata store tracking each file, and the
//! lifecycle manager that self-destructs files after a single download or
//! a fixed time-to-live.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod lifecycle;
pub mod metadata;
pub mod metrics;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::lifecycle::Lifecycle;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Lifecycle manager owning the create → deliver → expire state machine.
    pub lifecycle: Lifecycle,
}
