//! Shared building blocks for the media toolbox.
//!
//! Holds the common error type, identifier aliases used by the ComfyUI
//! client, and the 3x3 grid slicer.

pub mod error;
pub mod grid;
pub mod types;
