//! WebSocket client for connecting to a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the connection configuration for a single
//! ComfyUI instance plus the session `client_id`, generated once per
//! client and reused for every connection and submission. Call
//! [`ComfyUIClient::connect`] to establish a live [`ComfyUIConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream};
use toolbox_core::types::ClientId;

/// Raw WebSocket stream to a ComfyUI server.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for a ComfyUI instance.
pub struct ComfyUIClient {
    client_id: ClientId,
    ws_url: String,
    api_url: String,
}

/// A live WebSocket connection to a ComfyUI instance.
pub struct ComfyUIConnection {
    /// Session ID sent during the WebSocket handshake.
    pub client_id: ClientId,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl ComfyUIClient {
    /// Create a new client targeting a specific ComfyUI instance.
    ///
    /// * `ws_url`  - WebSocket base URL, e.g. `ws://host:8188`.
    /// * `api_url` - HTTP base URL, e.g. `http://host:8188`.
    pub fn new(ws_url: String, api_url: String) -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            ws_url,
            api_url,
        }
    }

    /// Client for a plain (non-TLS) server at `host:port`.
    pub fn from_address(address: &str) -> Self {
        Self::new(format!("ws://{address}"), format!("http://{address}"))
    }

    /// Session identifier shared by all connections and submissions
    /// made through this client.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// HTTP API base URL (e.g. `http://host:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Connect to the ComfyUI WebSocket endpoint.
    ///
    /// Appends the session `client_id` as a query parameter so that
    /// ComfyUI routes execution notifications to this connection.
    pub async fn connect(&self) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let url = format!("{}/ws?clientId={}", self.ws_url, self.client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %self.client_id,
            "Connected to ComfyUI at {}",
            self.ws_url,
        );

        Ok(ComfyUIConnection {
            client_id: self.client_id.clone(),
            ws_stream,
        })
    }
}

impl ComfyUIConnection {
    /// Send a close frame and drop the connection.
    ///
    /// Failures are logged and swallowed: the job result is already
    /// decided by the time the connection is closed.
    pub async fn close(mut self) {
        if let Err(e) = self.ws_stream.close(None).await {
            tracing::debug!(client_id = %self.client_id, error = %e, "WebSocket close failed");
        }
        tracing::debug!(client_id = %self.client_id, "Disconnected from ComfyUI");
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
