//! Session lifecycle: capability negotiation and teardown
//!
//! Negotiation runs once per session as a single background task:
//! bind surface → reference space (local-floor, falling back to local) →
//! viewer space → hit-test source. Each step reports back over a channel; the
//! owning screen applies the steps in order. Teardown is the only code path
//! that releases handles, and it runs at most once.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{HitTestSource, ReferenceSpace, ReferenceSpaceKind, TotemCode};
use crate::xr::{XrError, XrSession};

/// Called exactly once when the AR screen goes away
pub type ExitCallback = Box<dyn FnOnce() + Send>;

/// Why an AR screen closed
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// Player pressed exit
    UserExit,
    /// The runtime ended the session
    SessionEnded,
    /// Screen dropped or its input channel closed
    Unmounted,
    /// Marker activated, navigation to the trivia view
    HandedOff(TotemCode),
    /// Neither reference space (or the surface binding) could be obtained
    CapabilityUnavailable(XrError),
}

/// One negotiation step reported by the background task
#[derive(Debug)]
pub enum Negotiated {
    ReferenceSpace(ReferenceSpace),
    HitTestSource(HitTestSource),
    /// Non-fatal: the screen runs without a reticle
    HitTestUnavailable(XrError),
    /// Fatal: the screen must close
    Failed(XrError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    NotStarted,
    Pending,
    /// Reference space and hit-test source are active
    Ready,
    /// Reference space active, hit-testing unavailable
    Degraded,
    Failed,
}

pub struct SessionLifecycle {
    session: Arc<dyn XrSession>,
    /// Cancelled on teardown; checked by the negotiation task at every resume point
    mounted: CancellationToken,
    reference_space: Option<ReferenceSpace>,
    hit_test_source: Option<HitTestSource>,
    negotiation: NegotiationState,
    on_exit: Option<ExitCallback>,
    exit_reason: Option<ExitReason>,
}

impl SessionLifecycle {
    pub fn new(session: Arc<dyn XrSession>, on_exit: ExitCallback) -> Self {
        Self {
            session,
            mounted: CancellationToken::new(),
            reference_space: None,
            hit_test_source: None,
            negotiation: NegotiationState::NotStarted,
            on_exit: Some(on_exit),
            exit_reason: None,
        }
    }

    pub fn session(&self) -> &Arc<dyn XrSession> {
        &self.session
    }

    pub fn reference_space(&self) -> Option<&ReferenceSpace> {
        self.reference_space.as_ref()
    }

    pub fn hit_test_source(&self) -> Option<&HitTestSource> {
        self.hit_test_source.as_ref()
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.negotiation
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        self.exit_reason.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.exit_reason.is_some()
    }

    /// Spawn the negotiation task. Returns None if negotiation already ran
    /// for this session or the session is gone.
    pub fn start_negotiation(&mut self) -> Option<mpsc::Receiver<Negotiated>> {
        if self.negotiation != NegotiationState::NotStarted || self.is_torn_down() {
            return None;
        }
        self.negotiation = NegotiationState::Pending;

        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(negotiate(self.session.clone(), self.mounted.clone(), tx));
        Some(rx)
    }

    /// Apply one negotiation step. Err means the screen must close with that error.
    pub fn apply(&mut self, step: Negotiated) -> Result<(), XrError> {
        if self.is_torn_down() {
            self.release(step);
            return Ok(());
        }

        match step {
            Negotiated::ReferenceSpace(space) => {
                tracing::info!(space_id = space.id, kind = %space.kind, "Reference space active");
                self.reference_space = Some(space);
            }
            Negotiated::HitTestSource(source) => {
                if self.reference_space.is_none() {
                    tracing::warn!("Hit-test source arrived without a reference space");
                    self.session.cancel_hit_test_source(&source);
                    return Ok(());
                }
                tracing::info!(source_id = source.id, "Hit-test source active");
                self.hit_test_source = Some(source);
                self.negotiation = NegotiationState::Ready;
            }
            Negotiated::HitTestUnavailable(e) => {
                tracing::warn!("Hit-testing unavailable, reticle disabled: {}", e);
                self.negotiation = NegotiationState::Degraded;
            }
            Negotiated::Failed(e) => {
                tracing::error!("AR capability negotiation failed: {}", e);
                self.negotiation = NegotiationState::Failed;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop listening for negotiation results and release anything still queued
    pub fn discard_pending(&self, rx: &mut mpsc::Receiver<Negotiated>) {
        rx.close();
        while let Ok(step) = rx.try_recv() {
            self.release(step);
        }
    }

    fn release(&self, step: Negotiated) {
        if let Negotiated::HitTestSource(source) = step {
            release_late_source(self.session.as_ref(), &source);
        }
    }

    /// Release both handles, end the session and call the exit callback.
    /// Only the first call has any effect; returns whether this call did the work.
    pub fn teardown(&mut self, reason: ExitReason) -> bool {
        if self.is_torn_down() {
            return false;
        }
        tracing::info!(?reason, "Tearing down AR session");

        self.mounted.cancel();
        if let Some(source) = self.hit_test_source.take() {
            self.session.cancel_hit_test_source(&source);
        }
        self.reference_space = None;
        if reason != ExitReason::SessionEnded {
            self.session.end();
        }
        self.exit_reason = Some(reason);

        if let Some(on_exit) = self.on_exit.take() {
            on_exit();
        }
        true
    }
}

impl Drop for SessionLifecycle {
    fn drop(&mut self) {
        self.teardown(ExitReason::Unmounted);
    }
}

/// A source that arrived after the screen stopped listening. An ended
/// session has already released it on the device side.
fn release_late_source(session: &dyn XrSession, source: &HitTestSource) {
    if session.is_ended() {
        tracing::debug!(source_id = source.id, "Dropping hit-test source of ended session");
    } else {
        tracing::debug!(source_id = source.id, "Cancelling late hit-test source");
        session.cancel_hit_test_source(source);
    }
}

/// Try each preferred reference space kind in order; the last error wins
async fn acquire_reference_space(
    session: &dyn XrSession,
    mounted: &CancellationToken,
) -> Result<ReferenceSpace, XrError> {
    let mut last_error = XrError::NotSupported("reference space".to_string());
    for kind in ReferenceSpaceKind::PREFERENCE {
        if mounted.is_cancelled() {
            return Err(XrError::SessionEnded);
        }
        match session.request_reference_space(kind).await {
            Ok(space) => return Ok(space),
            Err(e) => {
                tracing::warn!("{} reference space unavailable: {}", kind, e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

async fn negotiate(
    session: Arc<dyn XrSession>,
    mounted: CancellationToken,
    tx: mpsc::Sender<Negotiated>,
) {
    if let Err(e) = session.bind_surface().await {
        let _ = tx.send(Negotiated::Failed(e)).await;
        return;
    }

    let space = match acquire_reference_space(session.as_ref(), &mounted).await {
        Ok(space) => space,
        Err(e) => {
            if !mounted.is_cancelled() {
                let _ = tx.send(Negotiated::Failed(e)).await;
            }
            return;
        }
    };
    if mounted.is_cancelled() || tx.send(Negotiated::ReferenceSpace(space)).await.is_err() {
        return;
    }

    let source = match session
        .request_reference_space(ReferenceSpaceKind::Viewer)
        .await
    {
        Ok(viewer) if !mounted.is_cancelled() => session.request_hit_test_source(&viewer).await,
        Ok(_) => return,
        Err(e) => Err(e),
    };

    match source {
        Ok(source) => {
            if mounted.is_cancelled() {
                release_late_source(session.as_ref(), &source);
                return;
            }
            if let Err(mpsc::error::SendError(step)) =
                tx.send(Negotiated::HitTestSource(source)).await
            {
                if let Negotiated::HitTestSource(source) = step {
                    release_late_source(session.as_ref(), &source);
                }
            }
        }
        Err(e) => {
            if !mounted.is_cancelled() {
                let _ = tx.send(Negotiated::HitTestUnavailable(e)).await;
            }
        }
    }
}
