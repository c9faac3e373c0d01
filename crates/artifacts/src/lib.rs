//! Artifact Manager: names and persists rendered images.
//!
//! # Invariants
//! - Artifact names are a pure function of (prefix, backend id, sweep point);
//!   re-running a sweep overwrites its previous outputs.
//! - Images are written immediately and never retained.

mod exr_io;
mod manager;
mod tonemap;

pub use exr_io::{read_exr, write_exr};
pub use manager::{ArtifactError, ArtifactManager, ArtifactPaths};
pub use tonemap::{tonemap_srgb8, write_png};
