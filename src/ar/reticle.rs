//! Reticle ring shown at the detected surface before placement

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

use crate::types::{ReticleState, Transform};

/// Flat ring mesh parameters (metres)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingGeometry {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub segments: u32,
}

pub const RETICLE_RING: RingGeometry = RingGeometry {
    inner_radius: 0.1,
    outer_radius: 0.25,
    segments: 32,
};

/// Render instruction for the reticle in the current frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReticleView {
    pub ring: RingGeometry,
    /// Hit pose with the ring's XY plane laid onto the surface
    pub model: Transform,
}

/// Lay a mesh authored in the XY plane flat onto the surface at `pose`
pub fn lay_flat(pose: &Transform) -> Transform {
    pose.mul(&Transform::rotation_x(-FRAC_PI_2))
}

/// Nothing when the sample is hidden, otherwise the ring at the sampled pose
pub fn present(state: &ReticleState) -> Option<ReticleView> {
    state.transform().map(|pose| ReticleView {
        ring: RETICLE_RING,
        model: lay_flat(pose),
    })
}
