//! `toolbox-cli` library crate.
//!
//! Configuration, logging setup and the two commands behind the
//! `comfy-run` and `grid-slice` binaries. The binary entrypoints live in
//! `src/bin/`.

pub mod config;
pub mod error;
pub mod output;
pub mod slice;
pub mod telemetry;
pub mod upscale;
