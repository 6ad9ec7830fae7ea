//! [`XrSession`] backed by a phone connected over the WebSocket bridge
//!
//! Capability requests are sent as [`BridgeMessage`]s carrying a request id; the
//! connection loop routes the device's [`DeviceReply`] back through [`RemoteSession::resolve`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};

use super::{XrError, XrEvent, XrResult, XrSession};
use crate::protocol::{BridgeMessage, DeviceReply};
use crate::types::{HitTestSource, ReferenceSpace, ReferenceSpaceKind};

pub struct RemoteSession {
    outbound: mpsc::UnboundedSender<BridgeMessage>,
    /// Same queue the device's native selects are pushed into
    events: mpsc::Sender<XrEvent>,
    pending: Mutex<HashMap<u64, oneshot::Sender<DeviceReply>>>,
    next_request_id: AtomicU64,
    request_timeout: Duration,
    ended: AtomicBool,
}

impl RemoteSession {
    pub fn new(
        outbound: mpsc::UnboundedSender<BridgeMessage>,
        events: mpsc::Sender<XrEvent>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            outbound,
            events,
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            request_timeout,
            ended: AtomicBool::new(false),
        }
    }

    async fn request(&self, build: impl FnOnce(u64) -> BridgeMessage) -> XrResult<DeviceReply> {
        if self.is_ended() {
            return Err(XrError::SessionEnded);
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id, tx);

        if self.outbound.send(build(request_id)).is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(XrError::BridgeClosed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(if self.is_ended() {
                XrError::SessionEnded
            } else {
                XrError::BridgeClosed
            }),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                tracing::warn!(request_id, "Device did not answer capability request");
                Err(XrError::Timeout(self.request_timeout))
            }
        }
    }

    /// Route a device reply to the request waiting for it.
    /// Returns false for unknown (late or duplicate) request ids.
    pub async fn resolve(&self, request_id: u64, reply: DeviceReply) -> bool {
        match self.pending.lock().await.remove(&request_id) {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                tracing::debug!(request_id, "Dropping reply for unknown request");
                false
            }
        }
    }

    /// Record that the device ended the session and fail every in-flight request
    pub async fn mark_ended(&self) {
        self.ended.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

fn unexpected_reply(reply: DeviceReply, request: &str) -> XrError {
    match reply {
        DeviceReply::Rejected { reason } => XrError::Rejected(reason),
        DeviceReply::NotSupported { reason } => XrError::NotSupported(reason),
        other => XrError::Rejected(format!("unexpected reply to {}: {:?}", request, other)),
    }
}

#[async_trait]
impl XrSession for RemoteSession {
    async fn bind_surface(&self) -> XrResult<()> {
        match self
            .request(|request_id| BridgeMessage::BindSurface { request_id })
            .await?
        {
            DeviceReply::Bound => Ok(()),
            other => Err(unexpected_reply(other, "bind_surface")),
        }
    }

    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> XrResult<ReferenceSpace> {
        match self
            .request(|request_id| BridgeMessage::RequestReferenceSpace { request_id, kind })
            .await?
        {
            DeviceReply::ReferenceSpace { space_id } => Ok(ReferenceSpace { id: space_id, kind }),
            other => Err(unexpected_reply(other, "request_reference_space")),
        }
    }

    async fn request_hit_test_source(&self, space: &ReferenceSpace) -> XrResult<HitTestSource> {
        let space_id = space.id;
        match self
            .request(|request_id| BridgeMessage::RequestHitTestSource {
                request_id,
                space_id,
            })
            .await?
        {
            DeviceReply::HitTestSource { source_id } => Ok(HitTestSource {
                id: source_id,
                space: space_id,
            }),
            other => Err(unexpected_reply(other, "request_hit_test_source")),
        }
    }

    fn cancel_hit_test_source(&self, source: &HitTestSource) {
        // Ignore send errors: a closed bridge has already dropped the device side
        let _ = self.outbound.send(BridgeMessage::CancelHitTestSource {
            source_id: source.id,
        });
    }

    fn dispatch_select(&self) {
        if let Err(e) = self.events.try_send(XrEvent::Select) {
            tracing::warn!("Dropped select signal: {}", e);
        }
    }

    fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            let _ = self.outbound.send(BridgeMessage::EndSession);
        }
    }

    fn is_ended(&self) -> bool {
        RemoteSession::is_ended(self)
    }
}
