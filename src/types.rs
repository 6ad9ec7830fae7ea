use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type MarkerId = String;
pub type VisitId = String;
pub type UserId = String;
pub type TotemCode = String;
pub type TriviaId = String;
pub type TotemId = String;

/// Handle ids minted by the device runtime
pub type SpaceId = u32;
pub type HitTestSourceId = u32;

// ========== Poses ==========

/// A 4x4 rigid-body pose, column-major (the WebXR `XRRigidTransform.matrix` layout).
///
/// `Copy` on purpose: the device rewrites its pose buffer every frame, so anything
/// that outlives a frame must hold its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform(pub [f32; 16]);

impl Transform {
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY.0;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        Transform(m)
    }

    /// Rotation of `angle` radians about the local X axis
    pub fn rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Transform([
            1.0, 0.0, 0.0, 0.0, //
            0.0, c, s, 0.0, //
            0.0, -s, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    pub fn translation(&self) -> [f32; 3] {
        [self.0[12], self.0[13], self.0[14]]
    }

    /// Matrix product `self * rhs` (apply `rhs` first, then `self`)
    pub fn mul(&self, rhs: &Transform) -> Transform {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
            }
        }
        Transform(out)
    }
}

// ========== XR handles ==========

/// Reference space kinds, using the WebXR names on the wire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceSpaceKind {
    LocalFloor,
    Local,
    Viewer,
}

impl ReferenceSpaceKind {
    /// Kinds tried for the main coordinate frame, most preferred first
    pub const PREFERENCE: [ReferenceSpaceKind; 2] =
        [ReferenceSpaceKind::LocalFloor, ReferenceSpaceKind::Local];
}

impl std::fmt::Display for ReferenceSpaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReferenceSpaceKind::LocalFloor => "local-floor",
            ReferenceSpaceKind::Local => "local",
            ReferenceSpaceKind::Viewer => "viewer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpace {
    pub id: SpaceId,
    pub kind: ReferenceSpaceKind,
}

/// A live hit-test subscription, anchored to the viewer space it was requested against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitTestSource {
    pub id: HitTestSourceId,
    pub space: SpaceId,
}

// ========== AR core state ==========

/// Reticle state for one frame. Visible iff `transform` is present.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReticleState {
    frame: Option<u64>,
    transform: Option<Transform>,
}

impl ReticleState {
    pub fn hidden(frame: u64) -> Self {
        Self {
            frame: Some(frame),
            transform: None,
        }
    }

    pub fn at(frame: u64, transform: Transform) -> Self {
        Self {
            frame: Some(frame),
            transform: Some(transform),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.transform.is_some()
    }

    pub fn transform(&self) -> Option<&Transform> {
        self.transform.as_ref()
    }

    /// Frame sequence number this state was computed in (None before the first frame)
    pub fn frame(&self) -> Option<u64> {
        self.frame
    }
}

/// The single marker placed during an AR visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedMarker {
    pub id: MarkerId,
    pub transform: Transform,
    pub source_code: TotemCode,
}

/// What a select signal means at the moment it arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapIntent {
    Place,
    Activate,
}

/// A live AR visit, tracked for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArVisit {
    pub id: VisitId,
    pub user_id: UserId,
    pub totem_code: TotemCode,
    pub started_at: String,
}

// ========== Trivia ==========

/// A trivia question for a scanned totem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: TriviaId,
    pub totem_id: TotemId,
    pub totem_code: TotemCode,
    pub text: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Non-question answers to a question lookup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SpecialState {
    /// The player already answered this totem's question
    AlreadyPlayed { message: Option<String> },
    /// The player must wait before playing again
    Cooldown { seconds: u64 },
    /// No question is configured for this totem
    NotFound,
    /// Gameplay is disabled by the admin
    AppInactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuestionLookup {
    Question(Question),
    Special(SpecialState),
}

/// An answer submitted from the trivia view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerSubmission {
    pub user_id: UserId,
    pub trivia_id: TriviaId,
    pub option_index: usize,
    pub totem_id: TotemId,
    pub totem_code: TotemCode,
}

/// Result of an answer submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Outcome {
    pub correct: bool,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Whether gameplay is currently enabled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AppStatus {
    pub active: bool,
}

/// Maximum accepted totem code length
pub const MAX_TOTEM_CODE_LEN: usize = 64;

/// Check a scanned totem code before entering AR (non-empty, `[A-Za-z0-9_-]`)
pub fn is_valid_totem_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_TOTEM_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
