//! AR surface detection, marker placement and tap handling

pub mod category;
pub mod lifecycle;
pub mod placement;
pub mod reticle;
pub mod sampler;
pub mod screen;

pub use lifecycle::{ExitCallback, ExitReason, NegotiationState, SessionLifecycle};
pub use placement::{PlacementMachine, TapOutcome};
pub use screen::{ArScreen, OverlayEvent, SceneState, ScreenOutcome};
