//! # beltane-types
//!
//! Shared type definitions for the Beltane spatial-audio animation engine.
//! Pure data: positions, tracks, animation specs, cues, presets, and the
//! interpolation/easing math they reference. No I/O lives here.

mod animation;
mod cue;
mod easing;
mod interpolation;
mod param;
mod position;
mod preset;
mod track;

pub use animation::{
    AnimationId, AnimationSpec, AnimationTransform, FormationPattern, TrackTransform,
};
pub use cue::{
    AnimationCue, Cue, CueId, CueKind, CueList, CueStatus, FollowAction, PresetCue, ProtocolCue,
    WireArg, WireMessage,
};
pub use easing::Easing;
pub use interpolation::{cubic_bezier, interpolate, InterpolationMode};
pub use param::ParamValue;
pub use position::Position;
pub use preset::{
    PositionPreset, PresetId, PresetScope, PresetTransition, Stagger, StaggerPattern,
    INITIAL_POSITIONS_NAME,
};
pub use track::{Track, TrackBank};

/// Unique identifier for a track on the device.
pub type TrackId = u32;
