//! Typed view of the `GET /history/{prompt_id}` response.
//!
//! Only the parts the client acts on are typed: per-node `images`
//! listings. Everything else in a node's output is kept as raw JSON.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use toolbox_core::types::{NodeId, PromptId};

/// Full history response: prompt id -> record. Empty when the server has
/// no record (prompt unknown, not finished, or already evicted).
pub type History = HashMap<PromptId, HistoryEntry>;

/// History record for one prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Outputs keyed by the producing node.
    #[serde(default)]
    pub outputs: BTreeMap<NodeId, NodeOutput>,
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

/// Execution status as reported in the history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Output listing of one node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageRef>>,
    /// Any other output kinds (text, gifs, latents...), untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Address of one output file on the server, as accepted by `/view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Folder type: `output`, `temp` or `input`.
    #[serde(rename = "type", default = "default_folder_type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

impl ImageRef {
    /// Temporary outputs (previews) are purged by the server on restart.
    pub fn is_temp(&self) -> bool {
        self.folder_type == "temp"
    }
}

impl HistoryEntry {
    /// Nodes that carry an `images` listing, in node id order.
    pub fn image_outputs(&self) -> impl Iterator<Item = (&NodeId, &[ImageRef])> {
        self.outputs
            .iter()
            .filter_map(|(node, output)| output.images.as_deref().map(|images| (node, images)))
    }
}
