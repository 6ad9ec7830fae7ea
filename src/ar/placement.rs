//! Placement/activation state machine
//!
//! One AR visit owns at most one marker. The first select signal that arrives
//! while the reticle is visible places it; every select after that activates it.

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::reticle::lay_flat;
use crate::types::{PlacedMarker, ReticleState, TapIntent, TotemCode, Transform};

/// Side length of the marker quad (metres)
pub const MARKER_SIZE: f32 = 0.3;

/// Effect of one select signal
#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    /// A marker was committed at the sampled pose
    Placed(PlacedMarker),
    /// The existing marker was tapped; hand this code to the trivia flow
    Activated(TotemCode),
    /// No marker and no surface yet
    Ignored,
}

/// Render instruction for the placed marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerView {
    pub marker_id: String,
    pub category: Category,
    pub icon: String,
    pub size: [f32; 2],
    pub model: Transform,
}

impl MarkerView {
    pub fn for_marker(marker: &PlacedMarker) -> Self {
        let category = Category::from_totem_code(&marker.source_code);
        Self {
            marker_id: marker.id.clone(),
            category,
            icon: category.icon_path().to_string(),
            size: [MARKER_SIZE, MARKER_SIZE],
            model: lay_flat(&marker.transform),
        }
    }
}

#[derive(Debug)]
pub struct PlacementMachine {
    source_code: TotemCode,
    marker: Option<PlacedMarker>,
}

impl PlacementMachine {
    /// `source_code` is the totem scanned to enter this AR visit
    pub fn new(source_code: TotemCode) -> Self {
        Self {
            source_code,
            marker: None,
        }
    }

    pub fn marker(&self) -> Option<&PlacedMarker> {
        self.marker.as_ref()
    }

    pub fn intent(&self) -> TapIntent {
        if self.marker.is_some() {
            TapIntent::Activate
        } else {
            TapIntent::Place
        }
    }

    /// Interpret one select signal against the latest reticle sample
    pub fn on_select(&mut self, reticle: &ReticleState) -> TapOutcome {
        match self.intent() {
            TapIntent::Activate => TapOutcome::Activated(self.source_code.clone()),
            TapIntent::Place => {
                let Some(transform) = reticle.transform() else {
                    return TapOutcome::Ignored;
                };
                let marker = PlacedMarker {
                    id: ulid::Ulid::new().to_string(),
                    transform: *transform,
                    source_code: self.source_code.clone(),
                };
                self.marker = Some(marker.clone());
                TapOutcome::Placed(marker)
            }
        }
    }
}
