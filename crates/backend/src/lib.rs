//! Backend adapters: translate sweep points into renderer-specific scene
//! mutations and drive the renderer.
//!
//! # Invariants
//! - Every binding target is resolved when the adapter is constructed; a
//!   target that does not exist fails there, never during a render.
//! - Each sweep point starts from a fresh copy of the base scene, so only the
//!   declared bindings differ between points.
//! - Transient scene files never outlive the invocation that created them.

mod binding;
mod external;
mod in_process;
mod probe;

pub use binding::{decode_medium, BindingError, Encoding, ParameterBinding};
pub use external::{ExternalCommand, ExternalProcessBackend, TransientScene};
pub use in_process::{EmbeddedRenderer, InProcessBackend, RendererError};
pub use probe::{ProbeRenderer, ProbeScene};

use crossrender_artifacts::ArtifactError;
use crossrender_common::Image;
use crossrender_scene::SceneError;
use crossrender_sweep::SweepPoint;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Errors raised by backend adapters.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("executable {0} does not exist")]
    MissingExecutable(PathBuf),
    #[error("{executable} exited with {}: {stderr}", describe_exit(.exit_code))]
    ExternalRender {
        executable: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("renderer exited successfully but wrote no output at {0}")]
    MissingOutput(PathBuf),
    #[error("embedded renderer error: {0}")]
    Embedded(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Lifecycle of one adapter invocation for one sweep point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Idle,
    Prepared,
    Rendering,
    Succeeded,
    Failed,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// A failed invocation: the state it had reached and the cause.
#[derive(Debug)]
pub struct BackendFailure {
    /// State the invocation was in when it failed (`Idle` while preparing,
    /// `Rendering` while rendering).
    pub during: InvocationState,
    pub error: BackendError,
}

fn stage_name(state: InvocationState) -> &'static str {
    match state {
        InvocationState::Idle => "prepare",
        _ => "render",
    }
}

impl BackendFailure {
    pub fn stage(&self) -> &'static str {
        stage_name(self.during)
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage(), self.error)
    }
}

impl std::error::Error for BackendFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A rendering backend driven by sweep points.
pub trait Backend {
    /// Scene state ready to render for one sweep point.
    type Prepared;

    /// Stable identifier, used in artifact names.
    fn id(&self) -> &str;

    fn bindings(&self) -> &[ParameterBinding];

    /// Apply the point's parameter values to a fresh copy of the base scene.
    fn prepare(&self, point: &SweepPoint) -> Result<Self::Prepared, BackendError>;

    /// Render a prepared scene. Blocks until the image is available.
    fn render(&self, prepared: Self::Prepared) -> Result<Image, BackendError>;
}

/// Object-safe view of a [`Backend`], implemented for every backend.
pub trait DynBackend {
    fn id(&self) -> &str;

    /// Names of the sweep parameters the backend's bindings read.
    fn parameters(&self) -> Vec<String>;

    /// Run prepare then render for one point.
    fn invoke(&self, point: &SweepPoint) -> Result<Image, BackendFailure>;
}

impl<B: Backend> DynBackend for B {
    fn id(&self) -> &str {
        Backend::id(self)
    }

    fn parameters(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .bindings()
            .iter()
            .flat_map(|b| b.encoding.parameters())
            .map(str::to_string)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn invoke(&self, point: &SweepPoint) -> Result<Image, BackendFailure> {
        let id = Backend::id(self);
        let mut state = InvocationState::Idle;
        let fail = |during, error| BackendFailure { during, error };

        let prepared = self.prepare(point).map_err(|e| fail(state, e))?;
        state = transition(id, point, state, InvocationState::Prepared);
        state = transition(id, point, state, InvocationState::Rendering);
        match self.render(prepared) {
            Ok(image) => {
                transition(id, point, state, InvocationState::Succeeded);
                Ok(image)
            }
            Err(e) => {
                let during = state;
                transition(id, point, state, InvocationState::Failed);
                Err(fail(during, e))
            }
        }
    }
}

fn transition(
    backend: &str,
    point: &SweepPoint,
    from: InvocationState,
    to: InvocationState,
) -> InvocationState {
    tracing::trace!(backend, point = point.index(), ?from, ?to, "invocation state");
    to
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
