use crate::ar::screen::SceneState;
use crate::types::*;
use crate::xr::XrFrame;
use serde::{Deserialize, Serialize};

/// Messages sent by the device (the phone's immersive runtime and its DOM overlay)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum DeviceMessage {
    /// Answer to a capability request issued by the bridge
    Reply {
        request_id: u64,
        #[serde(flatten)]
        reply: DeviceReply,
    },
    /// Per-frame hit-test results
    Frame(XrFrame),
    /// Native select signal from the runtime's input sources
    Select,
    /// Pointer tap on the DOM overlay above the canvas
    Tap,
    /// The runtime ended the session on its own
    SessionEnded,
    /// Player pressed the exit button
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeviceReply {
    Bound,
    ReferenceSpace { space_id: SpaceId },
    HitTestSource { source_id: HitTestSourceId },
    Rejected { reason: String },
    NotSupported { reason: String },
}

/// Messages sent by the bridge to the device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum BridgeMessage {
    Welcome {
        protocol: String,
        visit_id: VisitId,
        totem_code: TotemCode,
        server_now: String,
    },
    BindSurface {
        request_id: u64,
    },
    RequestReferenceSpace {
        request_id: u64,
        kind: ReferenceSpaceKind,
    },
    RequestHitTestSource {
        request_id: u64,
        space_id: SpaceId,
    },
    CancelHitTestSource {
        source_id: HitTestSourceId,
    },
    EndSession,
    /// What the device should render this frame
    Scene(SceneState),
    /// One-way navigation to the trivia view
    Navigate {
        route: String,
        totem_code: TotemCode,
    },
    /// AR session closed; release the AR view. Follows `Navigate` when the
    /// marker was activated, and must not undo that navigation.
    ExitAr,
    Error {
        code: String,
        msg: String,
    },
}

pub const PROTOCOL_VERSION: &str = "1.0";
