//! Typed view of the JSON notifications ComfyUI pushes over its WebSocket.
//!
//! Every text frame looks like `{"type": "<kind>", "data": {...}}`. Only
//! the kinds the job client reacts to are modelled here; anything else
//! (`execution_start`, `executed`, custom node chatter) fails to parse
//! and the caller skips it.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ComfyUIMessage {
    /// Queue broadcast, sent on connect and whenever the queue changes.
    Status(StatusData),
    /// Nodes skipped because their outputs were cached.
    ExecutionCached(CachedData),
    /// A node started running. A null node ends the prompt.
    Executing(ExecutingData),
    /// Step progress inside a long-running node.
    Progress(ProgressData),
    /// A node raised. The server still sends the final `executing`.
    ExecutionError(ExecutionErrorData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    #[serde(default)]
    status: Option<QueueState>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueueState {
    exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct ExecInfo {
    queue_remaining: u32,
}

impl StatusData {
    /// Prompts still waiting in the server queue, when reported.
    pub fn queue_remaining(&self) -> Option<u32> {
        self.status.as_ref().map(|s| s.exec_info.queue_remaining)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CachedData {
    pub prompt_id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    pub prompt_id: String,
}

/// Older servers send `progress` without `prompt_id` and `node`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub value: i32,
    pub max: i32,
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub exception_type: String,
    #[serde(default)]
    pub exception_message: String,
}

impl ComfyUIMessage {
    /// True for the `executing` message with a null node that marks the
    /// end of `prompt_id`'s execution graph.
    pub fn is_completion_of(&self, prompt_id: &str) -> bool {
        matches!(
            self,
            ComfyUIMessage::Executing(data) if data.node.is_none() && data.prompt_id == prompt_id
        )
    }
}

/// Parse one text frame. Unknown `type` values are an error.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}
