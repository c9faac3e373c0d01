//! Parameter Sweep Engine: turns named value lists into an ordered sequence of
//! sweep points.
//!
//! # Invariants
//! - Every point of a sweep assigns a value to the same parameter names.
//! - Enumeration order is a pure function of the inputs; there is no randomness.
//! - Invalid sweeps are rejected at construction, before anything renders.

mod point;
mod sweep;

pub use point::SweepPoint;
pub use sweep::{Parameter, Sweep, SweepConfigError, SweepPoints, SweepPolicy};
