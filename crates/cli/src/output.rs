//! Writing downloaded job outputs to disk.

use std::path::{Path, PathBuf};

use toolbox_comfyui::runner::JobOutputs;

use crate::error::CliError;

/// Write every blob as `{node}_{index:02}.{ext}` under `dir`, creating it
/// if needed. The extension is sniffed from the bytes (`bin` when the
/// format is unknown). Returns the written paths in node/listing order.
pub fn save_outputs(outputs: &JobOutputs, dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut written = Vec::new();
    for (node, blobs) in outputs {
        for (index, bytes) in blobs.iter().enumerate() {
            let path = dir.join(format!("{node}_{index:02}.{}", extension_for(bytes)));
            std::fs::write(&path, bytes).map_err(|source| CliError::Io {
                path: path.display().to_string(),
                source,
            })?;
            tracing::info!(path = %path.display(), bytes = bytes.len(), "Saved output");
            written.push(path);
        }
    }
    Ok(written)
}

fn extension_for(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin")
}
