//! Job lifecycle phases and the events published while a job runs.
//!
//! [`JobRunner`](crate::runner::JobRunner) broadcasts these on a
//! [`tokio::sync::broadcast`] channel. Nobody has to listen; sends with no
//! receivers are dropped.

use serde::Serialize;
use toolbox_core::types::{NodeId, PromptId};

/// Lifecycle of a single job. Transitions only move forward; failures
/// are returned as errors and are not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    Submitted,
    AwaitingCompletion,
    Completed,
    OutputsCollected,
}

impl JobPhase {
    /// The only phase this one may move to, or `None` when terminal.
    pub fn next(self) -> Option<JobPhase> {
        match self {
            JobPhase::Idle => Some(JobPhase::Submitted),
            JobPhase::Submitted => Some(JobPhase::AwaitingCompletion),
            JobPhase::AwaitingCompletion => Some(JobPhase::Completed),
            JobPhase::Completed => Some(JobPhase::OutputsCollected),
            JobPhase::OutputsCollected => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobPhase::Idle => "idle",
            JobPhase::Submitted => "submitted",
            JobPhase::AwaitingCompletion => "awaiting_completion",
            JobPhase::Completed => "completed",
            JobPhase::OutputsCollected => "outputs_collected",
        }
    }
}

/// An event emitted while running a job.
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The job moved to a new phase.
    PhaseChanged { prompt_id: PromptId, phase: JobPhase },

    /// The server started executing a node of the job.
    NodeExecuting { prompt_id: PromptId, node: NodeId },

    /// Nodes whose outputs were served from the server cache.
    NodesCached {
        prompt_id: PromptId,
        nodes: Vec<NodeId>,
    },

    /// Step-level progress of the running node.
    Progress {
        prompt_id: Option<PromptId>,
        node: Option<NodeId>,
        value: i32,
        max: i32,
        /// Completion percentage (0-100).
        percent: i16,
    },

    /// A node of the job raised. The job still runs to completion and
    /// collects whatever outputs the history lists.
    ExecutionError {
        prompt_id: PromptId,
        node: Option<NodeId>,
        exception_type: String,
        message: String,
    },

    /// One output file was downloaded.
    OutputFetched {
        prompt_id: PromptId,
        node: NodeId,
        filename: String,
        bytes: usize,
    },
}

/// Percentage of `value` out of `max`, 0 when `max` is not positive.
pub fn progress_percent(value: i32, max: i32) -> i16 {
    if max > 0 {
        ((f64::from(value) / f64::from(max)) * 100.0).clamp(0.0, 100.0) as i16
    } else {
        0
    }
}
