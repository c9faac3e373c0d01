//! Scene templates: an addressable, mutable element tree for renderer scene
//! descriptions.
//!
//! # Invariants
//! - Property paths are resolved once against a template and reused on every
//!   clone of it; mutation only ever changes attribute values, never structure.
//! - A path that does not resolve is an error at resolution time, never a
//!   silent no-op at mutation time.

mod element;
mod inspect;
mod path;
mod template;
mod xml;

pub use element::{Element, NodeKind};
pub use inspect::{OutlineEntry, SceneOutline};
pub use path::{PropertyPath, ResolvedPath, Segment};
pub use template::{ParameterTable, SceneTemplate};

use std::path::PathBuf;

/// Errors from loading, addressing and mutating scene templates.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("scene file {0} does not exist")]
    MissingInput(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid property path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("property path `{path}` not found: {reason}")]
    PathNotFound { path: String, reason: String },
    #[error("property path `{path}` is ambiguous: segment `{segment}` matches {matches} elements")]
    AmbiguousPath {
        path: String,
        segment: String,
        matches: usize,
    },
}
