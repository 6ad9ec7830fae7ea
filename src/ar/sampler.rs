//! Per-frame pose sampling against the active hit-test source

use crate::types::{HitTestSource, ReferenceSpace, ReticleState};
use crate::xr::XrFrame;

/// Sample one frame: the top-ranked hit for `source`, resolved in `space`.
///
/// Not visible when the session is not presenting, when either handle is
/// missing, when the frame has no hit for the source, or when the top hit has
/// no pose in `space`. No smoothing: the result reflects this frame only.
pub fn sample_frame(
    frame: &XrFrame,
    source: Option<&HitTestSource>,
    space: Option<&ReferenceSpace>,
) -> ReticleState {
    let (Some(source), Some(space)) = (source, space) else {
        return ReticleState::hidden(frame.seq);
    };
    if !frame.presenting {
        return ReticleState::hidden(frame.seq);
    }

    match frame
        .hit_test_results(source)
        .next()
        .and_then(|top| top.pose(space))
    {
        Some(transform) => ReticleState::at(frame.seq, transform),
        None => ReticleState::hidden(frame.seq),
    }
}

/// Holds the sample of the most recent frame and nothing older
#[derive(Debug, Default)]
pub struct PoseSampler {
    latest: ReticleState,
}

impl PoseSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest sample with this frame's
    pub fn sample(
        &mut self,
        frame: &XrFrame,
        source: Option<&HitTestSource>,
        space: Option<&ReferenceSpace>,
    ) -> &ReticleState {
        self.latest = sample_frame(frame, source, space);
        &self.latest
    }

    pub fn latest(&self) -> &ReticleState {
        &self.latest
    }
}
