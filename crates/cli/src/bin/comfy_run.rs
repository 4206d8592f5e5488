//! `comfy-run` -- upscale one image through a ComfyUI server.
//!
//! Queues the built-in SeedVR2 upscale workflow, waits for it on the
//! WebSocket, downloads the outputs and writes them to disk. See
//! [`ComfyConfig::from_env`] for the environment variables.

use toolbox_cli::config::ComfyConfig;
use toolbox_cli::{telemetry, upscale};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    telemetry::init_tracing("toolbox_cli=info,toolbox_comfyui=info");

    let config = ComfyConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    match upscale::run(&config).await {
        Ok(paths) => {
            tracing::info!(
                count = paths.len(),
                output_dir = %config.output_dir.display(),
                "Done",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "ComfyUI job failed");
            std::process::exit(1);
        }
    }
}
