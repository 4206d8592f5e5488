use toolbox_comfyui::api::ComfyUIApiError;
use toolbox_comfyui::runner::JobError;
use toolbox_core::error::CoreError;

use crate::config::ConfigError;

/// Errors surfaced by the `comfy-run` and `grid-slice` commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Upload failed: {0}")]
    Upload(#[from] ComfyUIApiError),

    #[error(transparent)]
    Slice(#[from] CoreError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
