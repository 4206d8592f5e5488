//! `grid-slice` -- split a 3x3 contact sheet into nine JPEG tiles.
//!
//! See [`SliceConfig::from_env`] for the environment variables.

use toolbox_cli::config::SliceConfig;
use toolbox_cli::{slice, telemetry};

fn main() {
    dotenvy::dotenv().ok();

    telemetry::init_tracing("toolbox_cli=info,toolbox_core=info");

    let config = SliceConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    if let Err(e) = slice::run(&config) {
        tracing::error!(error = %e, input = %config.input.display(), "Grid slicing failed");
        std::process::exit(1);
    }
}
