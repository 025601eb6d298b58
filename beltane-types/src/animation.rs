use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ParamValue, Position, TrackId};

/// Unique identifier for an animation spec.
pub type AnimationId = u32;

/// Per-track placement inside an animation: a spatial offset and a phase
/// shift in seconds. A positive `time_shift` delays the track's start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackTransform {
    pub offset: Position,
    pub time_shift: f32,
}

impl TrackTransform {
    pub fn offset(offset: Position) -> Self {
        Self { offset, time_shift: 0.0 }
    }

    pub fn shifted(time_shift: f32) -> Self {
        Self { offset: Position::ORIGIN, time_shift }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationPattern {
    /// Offsets ride the anchor as a rigid body, rotated to follow its heading.
    Rigid,
    /// Offsets are (azimuth, elevation, radius) placed on a sphere around the
    /// anchor, oriented by the anchor's direction from the formation origin.
    Spherical,
}

/// How model output maps onto the target tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AnimationTransform {
    /// Model output used verbatim on a single track.
    Absolute,
    /// Model output added to each track's own initial position (plus its
    /// per-track offset).
    Relative,
    /// Model output moves one conceptual anchor; tracks keep their geometry
    /// around it.
    Formation {
        anchor: Position,
        pattern: FormationPattern,
    },
}

impl Default for AnimationTransform {
    fn default() -> Self {
        Self::Absolute
    }
}

/// A reusable animation definition. Instantiated per trigger; one spec may
/// back several concurrent instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSpec {
    pub id: AnimationId,
    pub name: String,
    /// Registry id of the motion model, e.g. "circle".
    pub model_id: String,
    pub parameters: HashMap<String, ParamValue>,
    /// Nominal cycle length in seconds.
    pub duration: f32,
    #[serde(default)]
    pub loop_enabled: bool,
    #[serde(default)]
    pub ping_pong: bool,
    #[serde(default)]
    pub transform: AnimationTransform,
    /// Target tracks, in display order.
    pub tracks: Vec<TrackId>,
    /// Per-track offsets and phase shifts. Tracks absent from the map use
    /// the zero transform.
    #[serde(default)]
    pub track_transforms: HashMap<TrackId, TrackTransform>,
}

impl AnimationSpec {
    pub fn new(id: AnimationId, name: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            model_id: model_id.into(),
            parameters: HashMap::new(),
            duration: 10.0,
            loop_enabled: false,
            ping_pong: false,
            transform: AnimationTransform::Absolute,
            tracks: Vec::new(),
            track_transforms: HashMap::new(),
        }
    }

    pub fn track_transform(&self, track: TrackId) -> TrackTransform {
        self.track_transforms.get(&track).copied().unwrap_or_default()
    }

    pub fn with_param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_track_transform_is_zero() {
        let spec = AnimationSpec::new(1, "orbit", "circle");
        let tt = spec.track_transform(42);
        assert_eq!(tt.offset, Position::ORIGIN);
        assert_eq!(tt.time_shift, 0.0);
    }
}
