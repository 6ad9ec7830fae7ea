//! Immersive runtime seam
//!
//! The AR core never talks to a rendering runtime directly. It asks an
//! [`XrSession`] for capabilities and consumes [`XrEvent`]s from it: frames,
//! native select signals, and the end notification.

pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{
    HitTestSource, HitTestSourceId, ReferenceSpace, ReferenceSpaceKind, SpaceId, Transform,
};

pub use remote::RemoteSession;

/// Result type for runtime capability requests
pub type XrResult<T> = Result<T, XrError>;

/// Errors surfaced by the immersive runtime
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XrError {
    #[error("Capability request rejected: {0}")]
    Rejected(String),

    #[error("Capability not supported: {0}")]
    NotSupported(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Session has ended")]
    SessionEnded,

    #[error("Device bridge closed")]
    BridgeClosed,
}

/// A hit pose expressed in one reference space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacePose {
    pub space: SpaceId,
    pub matrix: Transform,
}

/// One ranked hit against the detected surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitTestResult {
    pub source: HitTestSourceId,
    /// Pose of the hit resolved in each space the device knows about
    pub poses: Vec<SpacePose>,
}

impl HitTestResult {
    /// Pose of this hit expressed in `space`
    pub fn pose(&self, space: &ReferenceSpace) -> Option<Transform> {
        self.poses
            .iter()
            .find(|p| p.space == space.id)
            .map(|p| p.matrix)
    }
}

/// A rendered frame as reported by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XrFrame {
    pub seq: u64,
    /// False while the session is hidden/blurred (e.g. system overlay on top)
    #[serde(default = "default_presenting")]
    pub presenting: bool,
    /// Hit results in rank order, across all sources
    #[serde(default)]
    pub results: Vec<HitTestResult>,
}

fn default_presenting() -> bool {
    true
}

impl XrFrame {
    /// Ranked results produced for `source` in this frame
    pub fn hit_test_results<'a>(
        &'a self,
        source: &'a HitTestSource,
    ) -> impl Iterator<Item = &'a HitTestResult> + 'a {
        self.results.iter().filter(move |r| r.source == source.id)
    }
}

/// Events the runtime pushes into a mounted AR screen
#[derive(Debug, Clone, PartialEq)]
pub enum XrEvent {
    /// Per-frame callback
    Frame(XrFrame),
    /// Native select signal (one per recognised tap)
    Select,
    /// The runtime ended the session
    End,
}

/// Capability surface of an already-granted immersive session
#[async_trait]
pub trait XrSession: Send + Sync {
    /// Enable immersive rendering on the surface and attach the session to it
    async fn bind_surface(&self) -> XrResult<()>;

    async fn request_reference_space(&self, kind: ReferenceSpaceKind) -> XrResult<ReferenceSpace>;

    /// Subscribe to hit-testing along the rays of `space` (normally the viewer space)
    async fn request_hit_test_source(&self, space: &ReferenceSpace) -> XrResult<HitTestSource>;

    fn cancel_hit_test_source(&self, source: &HitTestSource);

    /// Feed a native select signal into the session's input channel
    fn dispatch_select(&self);

    /// End the session. Safe to call on an already ended session.
    fn end(&self);

    /// Whether the session has ended, by `end` or by the runtime.
    /// Handles of an ended session are already released.
    fn is_ended(&self) -> bool;
}
