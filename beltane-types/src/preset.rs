use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Easing, InterpolationMode, Position, TrackId};

/// Unique identifier for a position preset.
pub type PresetId = u32;

/// Name reserved for the auto-maintained preset mirroring initial positions.
pub const INITIAL_POSITIONS_NAME: &str = "Initial Positions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresetScope {
    /// Travels with the project file.
    Project,
    /// Lives in the user's profile.
    Global,
}

impl Default for PresetScope {
    fn default() -> Self {
        Self::Project
    }
}

/// A named snapshot of per-track positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionPreset {
    pub id: PresetId,
    pub name: String,
    #[serde(default)]
    pub scope: PresetScope,
    #[serde(default)]
    pub category: Option<String>,
    pub positions: HashMap<TrackId, Position>,
    /// Capture order; drives sequential stagger.
    pub track_ids: Vec<TrackId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
    /// Unix seconds.
    pub created_at: u64,
    pub updated_at: u64,
    /// True only for the maintained "Initial Positions" preset.
    #[serde(default)]
    pub auto: bool,
}

/// Per-track delay distribution when a transition fans out over many tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaggerPattern {
    Sequential,
    ReverseSequential,
    /// Seeded, so the same cue replays identically.
    Random,
    /// Inner tracks (closest to the source centroid) move first.
    SpatialInOut,
    /// Outer tracks move first.
    SpatialOutIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stagger {
    pub pattern: StaggerPattern,
    /// Per-step delay in seconds (Sequential/Reverse/Spatial), or the maximum
    /// random delay.
    pub delay: f32,
    /// 0 = full per-track duration, 1 = fully collapsed.
    #[serde(default)]
    pub overlap: f32,
    /// RNG seed for the Random pattern.
    #[serde(default)]
    pub seed: u64,
}

/// Timing envelope for recalling a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresetTransition {
    /// Seconds.
    pub duration: f32,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub mode: InterpolationMode,
    #[serde(default)]
    pub stagger: Option<Stagger>,
}

impl Default for PresetTransition {
    fn default() -> Self {
        Self {
            duration: 2.0,
            easing: Easing::Linear,
            mode: InterpolationMode::Cartesian,
            stagger: None,
        }
    }
}

impl PresetTransition {
    pub fn instant() -> Self {
        Self { duration: 0.0, ..Self::default() }
    }
}
