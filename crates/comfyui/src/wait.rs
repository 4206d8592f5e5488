//! Waiting for a prompt to finish on the ComfyUI WebSocket.
//!
//! Reads frames until the server reports that the awaited prompt's whole
//! graph has executed (`executing` with a null node and our prompt id).
//! That frame is the only way a wait succeeds. Everything else, including
//! `execution_error`, is logged, forwarded as a [`JobEvent`] where useful,
//! and skipped. Binary frames (latent previews) are never decoded.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::events::{progress_percent, JobEvent};
use crate::messages::{parse_message, ComfyUIMessage};

/// Errors that end a wait without a completion notification.
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The server closed the connection or the stream ended.
    #[error("WebSocket closed before the prompt completed")]
    ConnectionClosed,

    /// A receive error on the connection.
    #[error("WebSocket receive error: {0}")]
    Transport(String),

    /// No completion arrived within the configured limit.
    #[error("Timed out after {0:?} waiting for the prompt to complete")]
    TimedOut(Duration),
}

/// Wait until `prompt_id` completes, optionally bounded by `timeout`.
///
/// `None` waits indefinitely.
pub async fn wait_with_timeout<S>(
    stream: &mut S,
    prompt_id: &str,
    timeout: Option<Duration>,
    event_tx: &broadcast::Sender<JobEvent>,
) -> Result<(), WaitError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    match timeout {
        None => wait_for_completion(stream, prompt_id, event_tx).await,
        Some(limit) => tokio::time::timeout(limit, wait_for_completion(stream, prompt_id, event_tx))
            .await
            .map_err(|_| WaitError::TimedOut(limit))?,
    }
}

/// Consume frames from `stream` until `prompt_id` completes.
///
/// Returns right after the completion frame; later frames stay unread.
pub async fn wait_for_completion<S>(
    stream: &mut S,
    prompt_id: &str,
    event_tx: &broadcast::Sender<JobEvent>,
) -> Result<(), WaitError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if handle_text_message(&text, prompt_id, event_tx) {
                    return Ok(());
                }
            }
            Ok(Message::Binary(data)) => {
                tracing::trace!(bytes = data.len(), "Ignoring binary message (preview image)");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(prompt_id, ?frame, "ComfyUI WebSocket closed");
                return Err(WaitError::ConnectionClosed);
            }
            Ok(Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(prompt_id, error = %e, "WebSocket receive error");
                return Err(WaitError::Transport(e.to_string()));
            }
        }
    }

    Err(WaitError::ConnectionClosed)
}

/// Handle one text frame. `true` means the awaited prompt completed.
fn handle_text_message(
    text: &str,
    prompt_id: &str,
    event_tx: &broadcast::Sender<JobEvent>,
) -> bool {
    let msg = match parse_message(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::trace!(error = %e, raw_message = %text, "Skipping unmodelled message");
            return false;
        }
    };

    if msg.is_completion_of(prompt_id) {
        tracing::info!(prompt_id, "Execution completed (all nodes done)");
        return true;
    }

    match msg {
        ComfyUIMessage::Executing(data) if data.prompt_id == prompt_id => {
            if let Some(node) = data.node {
                tracing::debug!(prompt_id, node = %node, "Executing node");
                let _ = event_tx.send(JobEvent::NodeExecuting {
                    prompt_id: data.prompt_id,
                    node,
                });
            }
        }
        ComfyUIMessage::ExecutionCached(data) if data.prompt_id == prompt_id => {
            tracing::debug!(prompt_id, cached = data.nodes.len(), "Execution used cache");
            let _ = event_tx.send(JobEvent::NodesCached {
                prompt_id: data.prompt_id,
                nodes: data.nodes,
            });
        }
        ComfyUIMessage::Progress(data)
            if data.prompt_id.as_deref().map_or(true, |id| id == prompt_id) =>
        {
            let percent = progress_percent(data.value, data.max);
            tracing::debug!(
                prompt_id,
                value = data.value,
                max = data.max,
                percent,
                "Generation progress",
            );
            let _ = event_tx.send(JobEvent::Progress {
                prompt_id: data.prompt_id,
                node: data.node,
                value: data.value,
                max: data.max,
                percent,
            });
        }
        ComfyUIMessage::ExecutionError(data) if data.prompt_id == prompt_id => {
            tracing::error!(
                prompt_id,
                node_id = ?data.node_id,
                node_type = ?data.node_type,
                error_type = %data.exception_type,
                error_message = %data.exception_message,
                "Execution error, waiting for the prompt to finish",
            );
            let _ = event_tx.send(JobEvent::ExecutionError {
                prompt_id: data.prompt_id,
                node: data.node_id,
                exception_type: data.exception_type,
                message: data.exception_message,
            });
        }
        ComfyUIMessage::Status(data) => {
            tracing::debug!(queue_remaining = ?data.queue_remaining(), "ComfyUI queue status");
        }
        other => {
            tracing::trace!(prompt_id, message = ?other, "Ignoring message for another prompt");
        }
    }

    false
}
