//! Command configuration loaded from environment variables.
//!
//! Every setting has a default matching a local ComfyUI install, so both
//! commands run with no environment at all. Values are read after
//! `dotenvy::dotenv()`, so a `.env` file works too.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use toolbox_core::grid::DEFAULT_GUTTER;

/// Default wait for the completion notification, in seconds.
const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected} (got {value:?})")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Settings for `comfy-run`.
#[derive(Debug, Clone)]
pub struct ComfyConfig {
    /// `host:port` of the ComfyUI server.
    pub address: String,
    /// Completion wait limit; `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Where downloaded outputs are written.
    pub output_dir: PathBuf,
    /// Local image to upload before queueing. When unset the workflow
    /// references `input_filename`, which must already be on the server.
    pub input_image: Option<PathBuf>,
    pub input_filename: String,
    pub seed: u64,
    pub random_seed: bool,
    pub resolution: u32,
}

impl ComfyConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default          |
    /// |-----------------------------|------------------|
    /// | `COMFYUI_ADDRESS`           | `127.0.0.1:8188` |
    /// | `COMFYUI_WAIT_TIMEOUT_SECS` | `300` (`0` = no limit) |
    /// | `COMFYUI_OUTPUT_DIR`        | `media/upscale`  |
    /// | `COMFYUI_INPUT_IMAGE`       | unset            |
    /// | `COMFYUI_INPUT_FILENAME`    | `tile_2_1.png`   |
    /// | `COMFYUI_SEED`              | `42`             |
    /// | `COMFYUI_RANDOM_SEED`       | `false`          |
    /// | `COMFYUI_RESOLUTION`        | `4096`           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let address = lookup("COMFYUI_ADDRESS").unwrap_or_else(|| "127.0.0.1:8188".into());

        let timeout_secs: u64 = parse_var(
            &lookup,
            "COMFYUI_WAIT_TIMEOUT_SECS",
            DEFAULT_WAIT_TIMEOUT_SECS,
            "a whole number of seconds",
        )?;
        let wait_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let output_dir = lookup("COMFYUI_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("media/upscale"));

        let input_image = lookup("COMFYUI_INPUT_IMAGE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let input_filename =
            lookup("COMFYUI_INPUT_FILENAME").unwrap_or_else(|| "tile_2_1.png".into());

        let seed = parse_var(&lookup, "COMFYUI_SEED", 42, "a non-negative integer")?;
        let random_seed = parse_bool(&lookup, "COMFYUI_RANDOM_SEED", false)?;
        let resolution = parse_var(&lookup, "COMFYUI_RESOLUTION", 4096, "a pixel count")?;

        Ok(Self {
            address,
            wait_timeout,
            output_dir,
            input_image,
            input_filename,
            seed,
            random_seed,
            resolution,
        })
    }
}

/// Settings for `grid-slice`.
#[derive(Debug, Clone)]
pub struct SliceConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Inward crop per interior tile edge, in pixels.
    pub gutter: u32,
}

impl SliceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var            | Default        |
    /// |--------------------|----------------|
    /// | `SLICE_INPUT`      | `grid.jpeg`    |
    /// | `SLICE_OUTPUT_DIR` | `split_images` |
    /// | `SLICE_GUTTER`     | `4`            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let input = lookup("SLICE_INPUT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("grid.jpeg"));
        let output_dir = lookup("SLICE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("split_images"));
        let gutter = parse_var(&lookup, "SLICE_GUTTER", DEFAULT_GUTTER, "a pixel count")?;

        Ok(Self {
            input,
            output_dir,
            gutter,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            expected: "true or false",
        }),
    }
}
