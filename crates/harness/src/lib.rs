//! Execution Orchestrator: drives every registered backend over every sweep
//! point and hands the images to the artifact manager.
//!
//! # Invariants
//! - Configuration problems (unknown or duplicate backends, unbound
//!   parameters, colliding artifact names) abort the run before anything
//!   renders or is written.
//! - A failure for one (backend, point) pair is recorded and the run moves on.
//! - Points are visited in sweep order and backends in registration order.

mod config;
mod orchestrator;
mod report;

pub use config::{BackendConfig, BackendKind, ConfigError, RunConfig, SweepConfig};
pub use orchestrator::{Harness, PlannedArtifact};
pub use report::{ArtifactRecord, FailureRecord, RunReport};

use crossrender_backend::BackendError;
use crossrender_sweep::SweepConfigError;
use std::path::PathBuf;

/// Errors that stop a run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Sweep(#[from] SweepConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("backend id `{0}` is registered more than once")]
    DuplicateBackend(String),
    #[error("no backend with id `{0}` is registered")]
    UnknownBackend(String),
    #[error("backend `{backend}` binds parameter `{parameter}` which the sweep does not define")]
    UnboundParameter { backend: String, parameter: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
