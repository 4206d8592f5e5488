//! One-shot job orchestration: submit, wait, collect.
//!
//! [`JobRunner::run`] opens a WebSocket, queues the workflow under a
//! fresh prompt id, waits for the completion notification, reads the
//! prompt history and downloads every listed output image, one at a
//! time. The first failure aborts the whole job.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::broadcast;
use toolbox_core::types::NodeId;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::{ComfyUIClient, ComfyUIClientError, ComfyUIConnection};
use crate::events::{JobEvent, JobPhase};
use crate::wait::{wait_with_timeout, WaitError};
use crate::workflow::Workflow;

/// Broadcast channel capacity for job events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Downloaded outputs: node id -> file contents in listing order.
pub type JobOutputs = BTreeMap<NodeId, Vec<Vec<u8>>>;

/// Runs jobs against one ComfyUI instance.
///
/// The session `client_id` comes from the wrapped [`ComfyUIClient`], so
/// every job run through the same runner shares it.
pub struct JobRunner {
    client: ComfyUIClient,
    api: ComfyUIApi,
    wait_timeout: Option<Duration>,
    event_tx: broadcast::Sender<JobEvent>,
}

/// Errors that abort a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Connect(#[from] ComfyUIClientError),

    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    /// The history endpoint has no record of the prompt.
    #[error("No history recorded for prompt {0}")]
    HistoryMissing(String),
}

impl JobRunner {
    /// Runner without a wait timeout.
    pub fn new(client: ComfyUIClient) -> Self {
        let api = ComfyUIApi::new(client.api_url().to_string());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            api,
            wait_timeout: None,
            event_tx,
        }
    }

    /// Bound the completion wait. `None` waits indefinitely.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn client(&self) -> &ComfyUIClient {
        &self.client
    }

    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }

    /// Subscribe to job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Run one job on a fresh connection and close it afterwards,
    /// whatever the outcome.
    pub async fn run(&self, workflow: &Workflow) -> Result<JobOutputs, JobError> {
        let mut conn = self.client.connect().await?;
        let result = self.run_on(&mut conn, workflow).await;
        conn.close().await;
        result
    }

    /// Run one job on an already open connection.
    ///
    /// The connection must belong to this runner's client, otherwise the
    /// server routes the completion notification elsewhere.
    pub async fn run_on(
        &self,
        conn: &mut ComfyUIConnection,
        workflow: &Workflow,
    ) -> Result<JobOutputs, JobError> {
        let prompt_id = uuid::Uuid::new_v4().to_string();
        let mut phase = JobPhase::Idle;

        for link in workflow.dangling_links() {
            tracing::warn!(
                node = %link.node,
                input = %link.input,
                target = %link.target,
                "Workflow input links to a missing node",
            );
        }

        let submitted = self
            .api
            .queue_prompt(workflow, self.client.client_id(), &prompt_id)
            .await?;
        tracing::info!(
            prompt_id = %prompt_id,
            client_id = %self.client.client_id(),
            queue_number = ?submitted.number,
            "Workflow submitted to ComfyUI",
        );
        self.advance(&prompt_id, &mut phase, JobPhase::Submitted);

        self.advance(&prompt_id, &mut phase, JobPhase::AwaitingCompletion);
        wait_with_timeout(
            &mut conn.ws_stream,
            &prompt_id,
            self.wait_timeout,
            &self.event_tx,
        )
        .await?;
        self.advance(&prompt_id, &mut phase, JobPhase::Completed);

        let outputs = self.collect_outputs(&prompt_id).await?;
        self.advance(&prompt_id, &mut phase, JobPhase::OutputsCollected);

        tracing::info!(
            prompt_id = %prompt_id,
            nodes = outputs.len(),
            files = outputs.values().map(Vec::len).sum::<usize>(),
            "Collected job outputs",
        );
        Ok(outputs)
    }

    /// Fetch the history of a finished prompt and download every image
    /// listed by every node that has an `images` output.
    pub async fn collect_outputs(&self, prompt_id: &str) -> Result<JobOutputs, JobError> {
        let mut history = self.api.get_history(prompt_id).await?;
        let entry = history
            .remove(prompt_id)
            .ok_or_else(|| JobError::HistoryMissing(prompt_id.to_string()))?;

        let mut outputs = JobOutputs::new();
        for (node, images) in entry.image_outputs() {
            let mut blobs = Vec::with_capacity(images.len());
            for image in images {
                let bytes = self.api.view(image).await?;
                tracing::debug!(
                    prompt_id,
                    node = %node,
                    filename = %image.filename,
                    bytes = bytes.len(),
                    "Downloaded output",
                );
                let _ = self.event_tx.send(JobEvent::OutputFetched {
                    prompt_id: prompt_id.to_string(),
                    node: node.clone(),
                    filename: image.filename.clone(),
                    bytes: bytes.len(),
                });
                blobs.push(bytes);
            }
            outputs.insert(node.clone(), blobs);
        }

        Ok(outputs)
    }

    fn advance(&self, prompt_id: &str, phase: &mut JobPhase, to: JobPhase) {
        debug_assert_eq!(phase.next(), Some(to), "invalid job phase transition");
        *phase = to;
        tracing::debug!(prompt_id, phase = to.as_str(), "Job phase changed");
        let _ = self.event_tx.send(JobEvent::PhaseChanged {
            prompt_id: prompt_id.to_string(),
            phase: to,
        });
    }
}
