//! Workflow graphs (job descriptors) submitted to `/prompt`.
//!
//! A workflow is an opaque JSON tree: node id -> `{class_type, inputs,
//! _meta}`, where an input is either a literal or a `[node_id,
//! output_index]` link to another node. The client only fills in a few
//! inputs and forwards the rest untouched; well-formedness is the
//! server's job.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Node ids of the built-in upscale workflow.
pub const UPSCALER_NODE: &str = "10";
pub const SAVE_IMAGE_NODE: &str = "15";
pub const LOAD_IMAGE_NODE: &str = "16";

/// Upper bound (exclusive) for randomly drawn seeds.
const MAX_RANDOM_SEED: u64 = 1_000_000_000;

/// An API-format ComfyUI workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow(Value);

/// A link from one node's input to another node's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLink {
    pub node: String,
    pub input: String,
    pub target: String,
    pub output_index: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Node {0} not found in workflow")]
    NodeNotFound(String),

    #[error("Node {0} has no inputs object")]
    MissingInputs(String),
}

impl Workflow {
    pub fn new(graph: Value) -> Self {
        Self(graph)
    }

    /// Parse a workflow exported in ComfyUI's API format.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text).map(Self)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Ids of all nodes in the graph.
    pub fn node_ids(&self) -> Vec<&str> {
        self.0
            .as_object()
            .map(|nodes| nodes.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn class_type(&self, node: &str) -> Option<&str> {
        self.0.get(node)?.get("class_type")?.as_str()
    }

    pub fn input(&self, node: &str, key: &str) -> Option<&Value> {
        self.0.get(node)?.get("inputs")?.get(key)
    }

    /// Overwrite (or add) a single input of `node`.
    pub fn set_input(
        &mut self,
        node: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), WorkflowError> {
        let node_def = self
            .0
            .get_mut(node)
            .ok_or_else(|| WorkflowError::NodeNotFound(node.to_string()))?;
        let inputs = node_def
            .get_mut("inputs")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| WorkflowError::MissingInputs(node.to_string()))?;
        inputs.insert(key.to_string(), value.into());
        Ok(())
    }

    /// All `[node_id, output_index]` links in the graph.
    pub fn links(&self) -> Vec<NodeLink> {
        let Some(nodes) = self.0.as_object() else {
            return Vec::new();
        };

        let mut links = Vec::new();
        for (node, def) in nodes {
            let Some(inputs) = def.get("inputs").and_then(Value::as_object) else {
                continue;
            };
            for (input, value) in inputs {
                if let Some((target, output_index)) = as_link(value) {
                    links.push(NodeLink {
                        node: node.clone(),
                        input: input.clone(),
                        target: target.to_string(),
                        output_index,
                    });
                }
            }
        }
        links
    }

    /// Links whose target node does not exist. Diagnostic only: the
    /// server rejects such graphs on submission.
    pub fn dangling_links(&self) -> Vec<NodeLink> {
        self.links()
            .into_iter()
            .filter(|link| self.0.get(&link.target).is_none())
            .collect()
    }
}

fn as_link(value: &Value) -> Option<(&str, u64)> {
    match value.as_array()?.as_slice() {
        [Value::String(target), Value::Number(index)] => Some((target.as_str(), index.as_u64()?)),
        _ => None,
    }
}

/* --------------------------------------------------------------------------
Built-in upscale workflow
-------------------------------------------------------------------------- */

/// Parameters of the built-in SeedVR2 upscale workflow.
#[derive(Debug, Clone)]
pub struct UpscaleParams {
    /// Image name inside the server's `input` folder.
    pub input_filename: String,
    pub seed: u64,
    pub resolution: u32,
    pub max_resolution: u32,
}

impl Default for UpscaleParams {
    fn default() -> Self {
        Self {
            input_filename: "tile_2_1.png".to_string(),
            seed: 42,
            resolution: 4096,
            max_resolution: 4096,
        }
    }
}

/// Draw a seed in `0..1_000_000_000`.
pub fn random_seed() -> u64 {
    rand::rng().random_range(0..MAX_RANDOM_SEED)
}

/// Build the six-node upscale graph:
/// LoadImage(16) -> JoinImageWithAlpha(17) -> SeedVR2VideoUpscaler(10,
/// with DiT 14 and VAE 13) -> SaveImage(15).
pub fn upscale_workflow(params: &UpscaleParams) -> Workflow {
    Workflow(json!({
        "10": {
            "inputs": {
                "seed": params.seed,
                "resolution": params.resolution,
                "max_resolution": params.max_resolution,
                "batch_size": 1,
                "uniform_batch_size": false,
                "color_correction": "lab",
                "temporal_overlap": 0,
                "prepend_frames": 0,
                "input_noise_scale": 0,
                "latent_noise_scale": 0,
                "offload_device": "cpu",
                "enable_debug": false,
                "image": ["17", 0],
                "dit": ["14", 0],
                "vae": ["13", 0]
            },
            "class_type": "SeedVR2VideoUpscaler",
            "_meta": { "title": "SeedVR2 Video Upscaler (v2.5.22)" }
        },
        "13": {
            "inputs": {
                "model": "ema_vae_fp16.safetensors",
                "device": "cuda:0",
                "encode_tiled": true,
                "encode_tile_size": 1024,
                "encode_tile_overlap": 128,
                "decode_tiled": true,
                "decode_tile_size": 1024,
                "decode_tile_overlap": 128,
                "tile_debug": "false",
                "offload_device": "cpu",
                "cache_model": false
            },
            "class_type": "SeedVR2LoadVAEModel",
            "_meta": { "title": "SeedVR2 (Down)Load VAE Model" }
        },
        "14": {
            "inputs": {
                "model": "seedvr2_ema_7b_sharp_fp16.safetensors",
                "device": "cuda:0",
                "blocks_to_swap": 36,
                "swap_io_components": false,
                "offload_device": "cpu",
                "cache_model": false,
                "attention_mode": "sdpa"
            },
            "class_type": "SeedVR2LoadDiTModel",
            "_meta": { "title": "SeedVR2 (Down)Load DiT Model" }
        },
        "15": {
            "inputs": {
                "filename_prefix": "ComfyUI",
                "images": ["10", 0]
            },
            "class_type": "SaveImage",
            "_meta": { "title": "Save Image" }
        },
        "16": {
            "inputs": {
                "image": params.input_filename
            },
            "class_type": "LoadImage",
            "_meta": { "title": "Load Image" }
        },
        "17": {
            "inputs": {
                "image": ["16", 0],
                "alpha": ["16", 1]
            },
            "class_type": "JoinImageWithAlpha",
            "_meta": { "title": "Join Image with Alpha" }
        }
    }))
}
