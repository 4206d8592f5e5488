//! The `comfy-run` command: upscale one image through ComfyUI.

use std::path::{Path, PathBuf};

use toolbox_comfyui::client::ComfyUIClient;
use toolbox_comfyui::runner::JobRunner;
use toolbox_comfyui::workflow::{random_seed, upscale_workflow, UpscaleParams};

use crate::config::ComfyConfig;
use crate::error::CliError;
use crate::output::save_outputs;

/// Build the upscale workflow from `config`, run it, and save every
/// output under `config.output_dir`. Returns the written paths.
///
/// When `config.input_image` is set the file is uploaded first and the
/// name the server assigns is used as the `LoadImage` input.
pub async fn run(config: &ComfyConfig) -> Result<Vec<PathBuf>, CliError> {
    let client = ComfyUIClient::from_address(&config.address);
    tracing::info!(
        address = %config.address,
        client_id = %client.client_id(),
        wait_timeout = ?config.wait_timeout,
        "Starting ComfyUI job",
    );
    let runner = JobRunner::new(client).with_wait_timeout(config.wait_timeout);

    let input_filename = match config.input_image {
        Some(ref path) => upload_input(&runner, path).await?,
        None => config.input_filename.clone(),
    };

    let seed = if config.random_seed {
        random_seed()
    } else {
        config.seed
    };

    let workflow = upscale_workflow(&UpscaleParams {
        input_filename,
        seed,
        resolution: config.resolution,
        ..Default::default()
    });

    let outputs = runner.run(&workflow).await?;
    save_outputs(&outputs, &config.output_dir)
}

async fn upload_input(runner: &JobRunner, path: &Path) -> Result<String, CliError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input.png".to_string());

    let uploaded = runner.api().upload_image(&filename, bytes).await?;
    tracing::info!(
        local = %path.display(),
        name = %uploaded.name,
        subfolder = %uploaded.subfolder,
        "Uploaded input image",
    );
    Ok(uploaded.name)
}
