//! The `grid-slice` command.

use toolbox_core::grid::{slice_image, SavedTile};

use crate::config::SliceConfig;
use crate::error::CliError;

/// Slice `config.input` into nine tiles under `config.output_dir`.
pub fn run(config: &SliceConfig) -> Result<Vec<SavedTile>, CliError> {
    let tiles = slice_image(&config.input, &config.output_dir, config.gutter)?;
    tracing::info!(
        count = tiles.len(),
        output_dir = %config.output_dir.display(),
        "Grid slicing complete",
    );
    Ok(tiles)
}
