//! In-process fake ComfyUI server for integration tests.
//!
//! Serves the four HTTP endpoints the client uses plus the WebSocket,
//! records every request, and plays a scripted notification sequence
//! once a prompt has been queued.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use toolbox_comfyui::client::ComfyUIClient;
use toolbox_comfyui::runner::JobRunner;

/// Bytes served for every output image.
pub const OUTPUT_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-upscaled-image";

/// Output file name listed in the history record of node "15".
pub const OUTPUT_FILENAME: &str = "ComfyUI_00001_.png";

/// `/view` answers 404 for this file name.
pub const MISSING_FILENAME: &str = "missing.png";

/// How the fake server reacts to a queued prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Plays a full execution and reports completion.
    Complete,
    /// Reports an execution error, then finishes the prompt with no
    /// outputs, the way the server does after a node raises.
    Fail,
    /// Accepts the prompt and never says anything about it.
    Silent,
    /// Rejects the prompt with 400.
    Reject,
    /// Completes, but the history endpoint has no record.
    ForgetHistory,
}

/// Requests recorded by the fake server.
pub struct FakeState {
    behavior: Behavior,
    prompt_tx: broadcast::Sender<String>,
    submissions: Mutex<Vec<Value>>,
    ws_client_ids: Mutex<Vec<String>>,
    views: Mutex<Vec<HashMap<String, String>>>,
    uploads: Mutex<Vec<Upload>>,
}

/// One multipart upload as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub size: usize,
    pub overwrite: Option<String>,
}

impl FakeState {
    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn ws_client_ids(&self) -> Vec<String> {
        self.ws_client_ids.lock().unwrap().clone()
    }

    pub fn views(&self) -> Vec<HashMap<String, String>> {
        self.views.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    fn is_submitted(&self, prompt_id: &str) -> bool {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .any(|body| body["prompt_id"] == prompt_id)
    }
}

/// A running fake server.
pub struct FakeComfy {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
}

impl FakeComfy {
    /// Bind to an ephemeral port and start serving.
    pub async fn start(behavior: Behavior) -> Self {
        let (prompt_tx, _) = broadcast::channel(16);
        let state = Arc::new(FakeState {
            behavior,
            prompt_tx,
            submissions: Mutex::new(Vec::new()),
            ws_client_ids: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/prompt", post(queue_prompt))
            .route("/history/{prompt_id}", get(history))
            .route("/view", get(view))
            .route("/upload/image", post(upload_image))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake server");
        });

        Self { addr, state }
    }

    /// `host:port` of the server.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn client(&self) -> ComfyUIClient {
        ComfyUIClient::from_address(&self.address())
    }

    /// Runner with a generous wait timeout so a broken test fails
    /// instead of hanging.
    pub fn runner(&self) -> JobRunner {
        JobRunner::new(self.client()).with_wait_timeout(Some(Duration::from_secs(10)))
    }
}

// ---- handlers ----

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<FakeState>>,
) -> Response {
    if let Some(client_id) = params.get("clientId") {
        state.ws_client_ids.lock().unwrap().push(client_id.clone());
    }
    // Subscribe before the handshake completes so no submission is missed.
    let rx = state.prompt_tx.subscribe();
    ws.on_upgrade(move |socket| drive_socket(socket, rx, state))
}

async fn drive_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<String>,
    state: Arc<FakeState>,
) {
    let status = json!({
        "type": "status",
        "data": {"status": {"exec_info": {"queue_remaining": 0}}, "sid": "fake"}
    });
    if socket.send(text(status)).await.is_err() {
        return;
    }

    let prompt_id = tokio::select! {
        id = rx.recv() => match id {
            Ok(id) => id,
            Err(_) => return,
        },
        _ = socket.recv() => return,
    };

    for frame in script(state.behavior, &prompt_id) {
        if socket.send(frame).await.is_err() {
            return;
        }
    }

    // Hold the connection until the client hangs up.
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

fn script(behavior: Behavior, prompt_id: &str) -> Vec<Message> {
    let executing = |node: Value, id: &str| {
        text(json!({"type": "executing", "data": {"node": node, "prompt_id": id}}))
    };

    match behavior {
        Behavior::Complete | Behavior::ForgetHistory => vec![
            text(json!({"type": "execution_start", "data": {"prompt_id": prompt_id}})),
            executing(Value::Null, "some-other-prompt"),
            executing(json!("16"), prompt_id),
            executing(json!("10"), prompt_id),
            Message::Binary(vec![0, 0, 0, 1, 0xff, 0xd8, 0xff].into()),
            text(json!({"type": "progress", "data": {"value": 1, "max": 2, "prompt_id": prompt_id, "node": "10"}})),
            text(json!({"type": "progress", "data": {"value": 2, "max": 2, "prompt_id": prompt_id, "node": "10"}})),
            executing(json!("15"), prompt_id),
            text(json!({"type": "executed", "data": {"node": "15", "prompt_id": prompt_id, "output": {"images": []}}})),
            executing(Value::Null, prompt_id),
        ],
        Behavior::Fail => vec![
            executing(json!("10"), prompt_id),
            text(json!({"type": "execution_error", "data": {
                "prompt_id": prompt_id,
                "node_id": "10",
                "node_type": "SeedVR2VideoUpscaler",
                "exception_message": "CUDA out of memory",
                "exception_type": "torch.OutOfMemoryError",
            }})),
            executing(Value::Null, prompt_id),
        ],
        Behavior::Silent | Behavior::Reject => Vec::new(),
    }
}

async fn queue_prompt(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    if state.behavior == Behavior::Reject {
        let error = json!({
            "error": {"type": "prompt_outputs_failed_validation", "message": "Prompt outputs failed validation"},
            "node_errors": {}
        });
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    }

    let prompt_id = body["prompt_id"].as_str().unwrap_or_default().to_string();
    state.submissions.lock().unwrap().push(body);
    let _ = state.prompt_tx.send(prompt_id.clone());

    Json(json!({"prompt_id": prompt_id, "number": 0, "node_errors": {}})).into_response()
}

async fn history(Path(prompt_id): Path<String>, State(state): State<Arc<FakeState>>) -> Json<Value> {
    let mut body = serde_json::Map::new();
    if state.behavior != Behavior::ForgetHistory && state.is_submitted(&prompt_id) {
        let entry = if state.behavior == Behavior::Fail {
            json!({
                "prompt": [0, prompt_id, {}, {}, ["15"]],
                "outputs": {},
                "status": {"status_str": "error", "completed": false, "messages": []}
            })
        } else {
            json!({
                "prompt": [0, prompt_id, {}, {}, ["15"]],
                "outputs": {
                    "15": {"images": [{"filename": OUTPUT_FILENAME, "subfolder": "", "type": "output"}]},
                    "17": {"text": ["not an image"]}
                },
                "status": {"status_str": "success", "completed": true, "messages": []}
            })
        };
        body.insert(prompt_id, entry);
    }
    Json(Value::Object(body))
}

async fn view(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<FakeState>>,
) -> Response {
    let missing = params.get("filename").map(String::as_str) == Some(MISSING_FILENAME);
    state.views.lock().unwrap().push(params);
    if missing {
        return (StatusCode::NOT_FOUND, "file not found").into_response();
    }
    OUTPUT_BYTES.to_vec().into_response()
}

async fn upload_image(State(state): State<Arc<FakeState>>, mut multipart: Multipart) -> Json<Value> {
    let mut upload = Upload {
        filename: String::new(),
        size: 0,
        overwrite: None,
    };

    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                upload.filename = field.file_name().unwrap_or_default().to_string();
                upload.size = field.bytes().await.expect("image bytes").len();
            }
            Some("overwrite") => {
                upload.overwrite = Some(field.text().await.expect("overwrite text"));
            }
            _ => {}
        }
    }

    let name = upload.filename.clone();
    state.uploads.lock().unwrap().push(upload);
    Json(json!({"name": name, "subfolder": "", "type": "input"}))
}

fn text(value: Value) -> Message {
    Message::Text(value.to_string().into())
}
