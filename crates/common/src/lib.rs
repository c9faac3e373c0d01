//! Shared types for the render validation harness.
//!
//! # Invariants
//! - A `ParamValue` is either a scalar or an RGB triple; arithmetic broadcasts scalars.
//! - An `Image` always holds exactly `width * height * channels` samples.

mod image;
mod value;

pub use image::{Image, ImageError};
pub use value::{ParamValue, ValueArityError};
