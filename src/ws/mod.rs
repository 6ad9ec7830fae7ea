pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{
    sink::{Sink, SinkExt},
    stream::{Stream, StreamExt},
};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::ar::{ArScreen, ExitCallback};
use crate::handoff::NavigationHandoff;
use crate::protocol::{BridgeMessage, DeviceMessage, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::types::{is_valid_totem_code, TotemCode, UserId};
use crate::xr::RemoteSession;

/// Device bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// How long to wait for the device to answer a capability request
    pub request_timeout: Duration,
    /// Capacity of the runtime event queue; a full queue holds the device reader
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            event_buffer: 64,
        }
    }
}

impl BridgeConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let request_timeout = std::env::var("XR_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        tracing::info!(?request_timeout, "Device bridge config loaded");

        Self {
            request_timeout,
            ..defaults
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ArQuery {
    pub totem: Option<String>,
    pub user: Option<String>,
}

/// Validated AR entry parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ArEntry {
    pub totem_code: TotemCode,
    pub user_id: UserId,
}

/// Check the entry parameters; Err carries (code, message) for the device
pub fn validate_entry(params: &ArQuery) -> Result<ArEntry, (&'static str, String)> {
    let totem_code = params.totem.as_deref().map(str::trim).unwrap_or_default();
    if !is_valid_totem_code(totem_code) {
        return Err(("INVALID_TOTEM", format!("Invalid totem code: {:?}", totem_code)));
    }
    let user_id = params.user.as_deref().map(str::trim).unwrap_or_default();
    if user_id.is_empty() {
        return Err(("MISSING_USER", "A user id is required".to_string()));
    }
    Ok(ArEntry {
        totem_code: totem_code.to_string(),
        user_id: user_id.to_string(),
    })
}

/// WebSocket upgrade handler for an AR visit
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ArQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "AR connection request: totem={:?}, user={:?}",
        params.totem,
        params.user
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

async fn send_message<S>(sender: &mut S, msg: &BridgeMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize bridge message: {}", e);
            true
        }
    }
}

async fn reject<S>(mut sender: S, code: &str, msg: String)
where
    S: Sink<Message> + Unpin,
{
    tracing::warn!(code, "Rejecting AR connection: {}", msg);
    let error = BridgeMessage::Error {
        code: code.to_string(),
        msg,
    };
    send_message(&mut sender, &error).await;
    let _ = sender.send(Message::Close(None)).await;
}

async fn handle_socket(socket: WebSocket, params: ArQuery, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    serve_visit(sender, receiver, params, state).await;
}

/// Run one AR visit over a device connection, given its two halves.
/// Returns once the screen has closed and its release messages are sent.
pub async fn serve_visit<S, R, E>(
    mut sender: S,
    mut receiver: R,
    params: ArQuery,
    state: Arc<AppState>,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let entry = match validate_entry(&params) {
        Ok(entry) => entry,
        Err((code, msg)) => return reject(sender, code, msg).await,
    };
    if !state.is_app_active().await {
        return reject(sender, "APP_INACTIVE", "Gameplay is currently disabled".to_string()).await;
    }

    let visit = state
        .start_visit(entry.user_id, entry.totem_code.clone())
        .await;

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (xr_tx, xr_rx) = mpsc::channel(state.bridge.event_buffer);
    let (overlay_tx, overlay_rx) = mpsc::channel(16);

    let remote = Arc::new(RemoteSession::new(
        outbound_tx.clone(),
        xr_tx.clone(),
        state.bridge.request_timeout,
    ));
    let exit_tx = outbound_tx.clone();
    let on_exit: ExitCallback = Box::new(move || {
        let _ = exit_tx.send(BridgeMessage::ExitAr);
    });
    let handoff = Arc::new(NavigationHandoff::new(outbound_tx));
    let screen = ArScreen::new(remote.clone(), entry.totem_code.clone(), on_exit, handoff);
    let mut scene_rx = screen.scene();

    let welcome = BridgeMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        visit_id: visit.id.clone(),
        totem_code: entry.totem_code,
        server_now: chrono::Utc::now().to_rfc3339(),
    };
    if !send_message(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        state.finish_visit(&visit.id).await;
        return;
    }

    let mut screen_task = tokio::spawn(screen.run(xr_rx, overlay_rx));
    // Dropping the overlay sender unmounts the screen
    let mut overlay_tx = Some(overlay_tx);
    let mut device_open = true;
    let mut scene_open = true;

    let outcome = loop {
        tokio::select! {
            outcome = &mut screen_task => break outcome,

            Some(msg) = outbound_rx.recv() => {
                if device_open && !send_message(&mut sender, &msg).await {
                    tracing::warn!("Device send failed, unmounting AR screen");
                    device_open = false;
                    overlay_tx = None;
                }
            }

            changed = scene_rx.changed(), if scene_open => {
                if changed.is_err() {
                    scene_open = false;
                    continue;
                }
                let scene = scene_rx.borrow_and_update().clone();
                if device_open && !send_message(&mut sender, &BridgeMessage::Scene(scene)).await {
                    device_open = false;
                    overlay_tx = None;
                }
            }

            ws_msg = receiver.next(), if device_open => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<DeviceMessage>(&text) {
                            Ok(msg) => {
                                handlers::handle_device_message(msg, &remote, &xr_tx, overlay_tx.as_ref())
                                    .await;
                            }
                            Err(e) => {
                                tracing::error!("Failed to parse device message: {}", e);
                                let error = BridgeMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                send_message(&mut sender, &error).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            device_open = false;
                            overlay_tx = None;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(visit_id = %visit.id, "Device disconnected");
                        device_open = false;
                        overlay_tx = None;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        device_open = false;
                        overlay_tx = None;
                    }
                }
            }
        }
    };

    // Teardown queued its release/exit messages; deliver them before closing
    while let Ok(msg) = outbound_rx.try_recv() {
        if !device_open || !send_message(&mut sender, &msg).await {
            break;
        }
    }

    match outcome {
        Ok(outcome) => tracing::info!(
            visit_id = %visit.id,
            reason = ?outcome.reason,
            placed = outcome.marker.is_some(),
            "AR screen closed"
        ),
        Err(e) => tracing::error!(visit_id = %visit.id, "AR screen task failed: {}", e),
    }
    state.finish_visit(&visit.id).await;
}
