/// Identifier of a node inside a workflow graph (e.g. `"15"`).
pub type NodeId = String;

/// Per-submission job identifier (UUID v4 string), called `prompt_id` on the wire.
pub type PromptId = String;

/// Per-process session identifier (UUID v4 string), called `clientId` on the wire.
pub type ClientId = String;
