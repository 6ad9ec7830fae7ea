mod common;

use axum::extract::ws::Message;
use common::{frame, question, InMemoryTrivia, FLOOR_SPACE, LOCAL_SPACE, SOURCE_ID, VIEWER_SPACE};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use totem_ar::ar::SceneState;
use totem_ar::protocol::{BridgeMessage, DeviceMessage, DeviceReply};
use totem_ar::state::AppState;
use totem_ar::types::{ReferenceSpaceKind, Transform};
use totem_ar::ws::{serve_visit, ArQuery, BridgeConfig};

const TOTEM: &str = "TOTEM01_Ahorro_INFO";
const WAIT: Duration = Duration::from_secs(2);

/// The phone's side of one bridge connection
struct Device {
    tx: Option<UnboundedSender<Result<Message, Infallible>>>,
    rx: UnboundedReceiver<Message>,
    bridge: JoinHandle<()>,
}

impl Device {
    fn send(&self, msg: &DeviceMessage) {
        let text = serde_json::to_string(msg).unwrap();
        self.tx
            .as_ref()
            .expect("device already disconnected")
            .unbounded_send(Ok(Message::Text(text.into())))
            .unwrap();
    }

    fn reply(&self, request_id: u64, reply: DeviceReply) {
        self.send(&DeviceMessage::Reply { request_id, reply });
    }

    fn disconnect(&mut self) {
        self.tx = None;
    }

    /// Next raw message; None once the bridge has closed its side
    async fn next(&mut self) -> Option<Message> {
        timeout(WAIT, self.rx.next()).await.expect("bridge stalled")
    }

    async fn recv(&mut self) -> BridgeMessage {
        loop {
            match self.next().await.expect("bridge closed") {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    async fn recv_within(&mut self, wait: Duration) -> Option<BridgeMessage> {
        match timeout(wait, self.rx.next()).await {
            Ok(Some(Message::Text(text))) => Some(serde_json::from_str(&text).unwrap()),
            _ => None,
        }
    }

    /// Everything the bridge sends until it closes
    async fn drain(&mut self) -> Vec<BridgeMessage> {
        let mut messages = Vec::new();
        while let Some(msg) = self.next().await {
            if let Message::Text(text) = msg {
                messages.push(serde_json::from_str(&text).unwrap());
            }
        }
        messages
    }

    /// Grant every capability the bridge asks for
    async fn grant_all(&mut self) {
        for _ in 0..4 {
            match self.recv().await {
                BridgeMessage::BindSurface { request_id } => self.reply(request_id, DeviceReply::Bound),
                BridgeMessage::RequestReferenceSpace { request_id, kind } => {
                    let space_id = match kind {
                        ReferenceSpaceKind::LocalFloor => FLOOR_SPACE,
                        ReferenceSpaceKind::Local => LOCAL_SPACE,
                        ReferenceSpaceKind::Viewer => VIEWER_SPACE,
                    };
                    self.reply(request_id, DeviceReply::ReferenceSpace { space_id });
                }
                BridgeMessage::RequestHitTestSource {
                    request_id,
                    space_id,
                } => {
                    assert_eq!(space_id, VIEWER_SPACE);
                    self.reply(
                        request_id,
                        DeviceReply::HitTestSource {
                            source_id: SOURCE_ID,
                        },
                    );
                }
                other => panic!("Expected a capability request, got {:?}", other),
            }
        }
    }

    /// Wait for the next published scene that satisfies `ready`
    async fn scene_where(&mut self, ready: impl Fn(&SceneState) -> bool) -> SceneState {
        loop {
            match self.recv().await {
                BridgeMessage::Scene(scene) if ready(&scene) => return scene,
                BridgeMessage::Scene(_) => continue,
                other => panic!("Expected Scene, got {:?}", other),
            }
        }
    }
}

fn state() -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(InMemoryTrivia::new(vec![question(TOTEM)])),
        true,
        BridgeConfig::default(),
    ))
}

fn connect(state: Arc<AppState>, totem: &str) -> Device {
    let (device_tx, bridge_rx) = unbounded::<Result<Message, Infallible>>();
    let (bridge_tx, device_rx) = unbounded::<Message>();
    let params = ArQuery {
        totem: Some(totem.to_string()),
        user: Some("user-1".to_string()),
    };
    let bridge = tokio::spawn(serve_visit(bridge_tx, bridge_rx, params, state));
    Device {
        tx: Some(device_tx),
        rx: device_rx,
        bridge,
    }
}

#[tokio::test]
async fn test_invalid_totem_rejected() {
    let state = state();
    let mut device = connect(state.clone(), "bad code");

    match device.recv().await {
        BridgeMessage::Error { code, .. } => assert_eq!(code, "INVALID_TOTEM"),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(matches!(device.next().await, Some(Message::Close(_))));
    assert!(device.next().await.is_none());
    assert!(state.list_visits().await.is_empty());
}

#[tokio::test]
async fn test_inactive_app_rejected() {
    let state = state();
    state.set_app_active(false).await.unwrap();
    let mut device = connect(state.clone(), TOTEM);

    match device.recv().await {
        BridgeMessage::Error { code, .. } => assert_eq!(code, "APP_INACTIVE"),
        other => panic!("Expected Error, got {:?}", other),
    }
    assert!(matches!(device.next().await, Some(Message::Close(_))));
    assert!(state.list_visits().await.is_empty());
}

#[tokio::test]
async fn test_visit_places_and_hands_off() {
    let state = state();
    let mut device = connect(state.clone(), TOTEM);

    let visit_id = match device.recv().await {
        BridgeMessage::Welcome {
            totem_code,
            visit_id,
            ..
        } => {
            assert_eq!(totem_code, TOTEM);
            visit_id
        }
        other => panic!("Expected Welcome, got {:?}", other),
    };
    assert_eq!(state.list_visits().await[0].id, visit_id);

    device.grant_all().await;

    // The source may still be on its way to the screen; keep the frames coming
    let t = Transform::from_translation(0.3, 0.0, -1.0);
    let mut reticle = None;
    for seq in 1..=20 {
        device.send(&DeviceMessage::Frame(frame(seq, Some((FLOOR_SPACE, t)))));
        if let Some(BridgeMessage::Scene(scene)) =
            device.recv_within(Duration::from_millis(100)).await
        {
            reticle = scene.reticle;
            if reticle.is_some() {
                break;
            }
        }
    }
    assert!(reticle.is_some(), "no reticle after surface was found");

    device.send(&DeviceMessage::Tap);
    let scene = device.scene_where(|scene| scene.marker.is_some()).await;
    assert_eq!(scene.marker.unwrap().icon, "/icons/ahorro.png");

    device.send(&DeviceMessage::Tap);
    let closing: Vec<_> = device
        .drain()
        .await
        .into_iter()
        .filter(|msg| !matches!(msg, BridgeMessage::Scene(_)))
        .collect();
    assert_eq!(
        closing,
        vec![
            BridgeMessage::Navigate {
                route: format!("/trivia/{}", TOTEM),
                totem_code: TOTEM.to_string(),
            },
            BridgeMessage::CancelHitTestSource {
                source_id: SOURCE_ID
            },
            BridgeMessage::EndSession,
            BridgeMessage::ExitAr,
        ]
    );

    timeout(WAIT, &mut device.bridge).await.unwrap().unwrap();
    assert!(state.list_visits().await.is_empty());
}

#[tokio::test]
async fn test_rejected_floor_falls_back_over_bridge() {
    let state = state();
    let mut device = connect(state, TOTEM);
    assert!(matches!(device.recv().await, BridgeMessage::Welcome { .. }));

    match device.recv().await {
        BridgeMessage::BindSurface { request_id } => device.reply(request_id, DeviceReply::Bound),
        other => panic!("Expected BindSurface, got {:?}", other),
    }
    match device.recv().await {
        BridgeMessage::RequestReferenceSpace { request_id, kind } => {
            assert_eq!(kind, ReferenceSpaceKind::LocalFloor);
            device.reply(
                request_id,
                DeviceReply::Rejected {
                    reason: "no floor".to_string(),
                },
            );
        }
        other => panic!("Expected RequestReferenceSpace, got {:?}", other),
    }
    match device.recv().await {
        BridgeMessage::RequestReferenceSpace { kind, .. } => {
            assert_eq!(kind, ReferenceSpaceKind::Local)
        }
        other => panic!("Expected RequestReferenceSpace, got {:?}", other),
    }

    device.send(&DeviceMessage::Exit);
    let closing = device.drain().await;
    assert_eq!(closing.last(), Some(&BridgeMessage::ExitAr));
    assert!(closing.contains(&BridgeMessage::EndSession));
}

#[tokio::test]
async fn test_disconnect_unmounts_screen() {
    let state = state();
    let mut device = connect(state.clone(), TOTEM);
    assert!(matches!(device.recv().await, BridgeMessage::Welcome { .. }));
    device.grant_all().await;
    assert_eq!(state.list_visits().await.len(), 1);

    device.disconnect();
    timeout(WAIT, &mut device.bridge).await.unwrap().unwrap();
    assert!(state.list_visits().await.is_empty());
}

#[tokio::test]
async fn test_garbage_answered_with_parse_error() {
    let state = state();
    let mut device = connect(state, TOTEM);
    assert!(matches!(device.recv().await, BridgeMessage::Welcome { .. }));

    device
        .tx
        .as_ref()
        .unwrap()
        .unbounded_send(Ok(Message::Text("{\"t\":\"warp\"}".into())))
        .unwrap();
    loop {
        match device.recv().await {
            BridgeMessage::Error { code, .. } => {
                assert_eq!(code, "PARSE_ERROR");
                break;
            }
            // Negotiation requests may arrive first
            _ => continue,
        }
    }
}
