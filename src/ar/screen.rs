//! AR host: one mounted screen per AR visit
//!
//! Composes the lifecycle, pose sampler, reticle and placement machine and
//! drives them from a single event loop. The loop consumes three inputs:
//! negotiation steps, runtime events (frames, native selects, end) and the
//! overlay's input layer (taps, exit). Overlay taps are forwarded into the
//! session as native select signals, so every select reaches the placement
//! machine through the same runtime channel.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use super::lifecycle::{ExitCallback, ExitReason, SessionLifecycle};
use super::placement::{MarkerView, PlacementMachine, TapOutcome};
use super::reticle::{self, ReticleView};
use super::sampler::PoseSampler;
use crate::handoff::TriviaHandoff;
use crate::types::{PlacedMarker, ReticleState, TotemCode};
use crate::xr::{XrEvent, XrFrame, XrSession};

/// Everything the device renders on top of the camera feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneState {
    pub reticle: Option<ReticleView>,
    pub marker: Option<MarkerView>,
}

/// Input captured by the transparent layer above the 3-D canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    Tap,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenOutcome {
    pub reason: ExitReason,
    pub marker: Option<PlacedMarker>,
}

pub struct ArScreen {
    lifecycle: SessionLifecycle,
    sampler: PoseSampler,
    placement: PlacementMachine,
    handoff: Arc<dyn TriviaHandoff>,
    scene: watch::Sender<SceneState>,
}

impl ArScreen {
    /// Mount a screen for an already granted session and the scanned totem
    pub fn new(
        session: Arc<dyn XrSession>,
        totem_code: TotemCode,
        on_exit: ExitCallback,
        handoff: Arc<dyn TriviaHandoff>,
    ) -> Self {
        let (scene, _) = watch::channel(SceneState::default());
        Self {
            lifecycle: SessionLifecycle::new(session, on_exit),
            sampler: PoseSampler::new(),
            placement: PlacementMachine::new(totem_code),
            handoff,
            scene,
        }
    }

    /// Subscribe to render state changes
    pub fn scene(&self) -> watch::Receiver<SceneState> {
        self.scene.subscribe()
    }

    pub fn reticle(&self) -> &ReticleState {
        self.sampler.latest()
    }

    pub fn marker(&self) -> Option<&PlacedMarker> {
        self.placement.marker()
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    /// Frame callback: sample, then update the reticle from this frame only
    pub fn on_frame(&mut self, frame: &XrFrame) {
        if self.lifecycle.is_torn_down() {
            return;
        }
        let state = self.sampler.sample(
            frame,
            self.lifecycle.hit_test_source(),
            self.lifecycle.reference_space(),
        );
        let view = reticle::present(state);
        self.scene.send_if_modified(|scene| {
            if scene.reticle == view {
                return false;
            }
            scene.reticle = view;
            true
        });
    }

    /// Native select signal. Returns the exit reason when the screen must close.
    pub fn on_select(&mut self) -> Option<ExitReason> {
        if self.lifecycle.is_torn_down() {
            return None;
        }
        match self.placement.on_select(self.sampler.latest()) {
            TapOutcome::Placed(marker) => {
                tracing::info!(
                    marker_id = %marker.id,
                    totem_code = %marker.source_code,
                    "Placed marker at {:?}",
                    marker.transform.translation()
                );
                let view = MarkerView::for_marker(&marker);
                self.scene.send_modify(|scene| scene.marker = Some(view));
                None
            }
            TapOutcome::Activated(totem_code) => {
                tracing::info!(totem_code = %totem_code, "Marker activated, handing off to trivia");
                self.handoff.hand_off(&totem_code);
                Some(ExitReason::HandedOff(totem_code))
            }
            TapOutcome::Ignored => {
                tracing::debug!("Select ignored, no surface detected yet");
                None
            }
        }
    }

    /// Overlay tap: forward into the session's native input channel
    pub fn on_tap(&self) {
        self.lifecycle.session().dispatch_select();
    }

    fn on_xr_event(
        &mut self,
        event: Option<XrEvent>,
        xr_events: &mut mpsc::Receiver<XrEvent>,
        deferred: &mut Option<XrEvent>,
    ) -> Option<ExitReason> {
        match event {
            Some(XrEvent::Frame(frame)) => {
                let frame = latest_frame(frame, xr_events, deferred);
                self.on_frame(&frame);
                None
            }
            Some(XrEvent::Select) => self.on_select(),
            Some(XrEvent::End) | None => Some(ExitReason::SessionEnded),
        }
    }

    /// Run until the visit ends. Teardown (and the exit callback) has run
    /// by the time this returns.
    pub async fn run(
        mut self,
        mut xr_events: mpsc::Receiver<XrEvent>,
        mut overlay: mpsc::Receiver<OverlayEvent>,
    ) -> ScreenOutcome {
        let mut negotiation = self.lifecycle.start_negotiation();
        // Event read past while skipping to the newest frame
        let mut deferred: Option<XrEvent> = None;

        let reason = loop {
            if let Some(event) = deferred.take() {
                match self.on_xr_event(Some(event), &mut xr_events, &mut deferred) {
                    Some(reason) => break reason,
                    None => continue,
                }
            }

            tokio::select! {
                biased;

                step = async {
                    match negotiation.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match step {
                        Some(step) => {
                            if let Err(e) = self.lifecycle.apply(step) {
                                break ExitReason::CapabilityUnavailable(e);
                            }
                        }
                        None => negotiation = None,
                    }
                }

                event = xr_events.recv() => {
                    if let Some(reason) = self.on_xr_event(event, &mut xr_events, &mut deferred) {
                        break reason;
                    }
                }

                input = overlay.recv() => {
                    match input {
                        Some(OverlayEvent::Tap) => self.on_tap(),
                        Some(OverlayEvent::Exit) => break ExitReason::UserExit,
                        None => break ExitReason::Unmounted,
                    }
                }
            }
        };

        if let Some(rx) = negotiation.as_mut() {
            self.lifecycle.discard_pending(rx);
        }
        self.lifecycle.teardown(reason.clone());

        ScreenOutcome {
            reason,
            marker: self.placement.marker().cloned(),
        }
    }
}

/// Skip queued frames up to the newest one. The first non-frame event is
/// parked in `deferred` so selects still see the frame that preceded them.
fn latest_frame(
    mut frame: XrFrame,
    xr_events: &mut mpsc::Receiver<XrEvent>,
    deferred: &mut Option<XrEvent>,
) -> XrFrame {
    while let Ok(event) = xr_events.try_recv() {
        match event {
            XrEvent::Frame(newer) => {
                tracing::trace!(skipped = frame.seq, seq = newer.seq, "Skipping stale frame");
                frame = newer;
            }
            other => {
                *deferred = Some(other);
                break;
            }
        }
    }
    frame
}
