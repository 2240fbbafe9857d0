//! The VRML97 field value model: the 20 tagged value types, their text
//! rendering, and copy-on-write multi-value buffers.

#![forbid(unsafe_code)]

pub mod field;
pub mod image;

pub use field::*;
pub use image::*;
