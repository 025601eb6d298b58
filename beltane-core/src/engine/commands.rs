//! Command and feedback types crossing the control/tick thread boundary.

use std::collections::HashMap;
use std::sync::Arc;

use beltane_types::{
    AnimationId, AnimationSpec, Easing, InterpolationMode, Position, TrackId, WireMessage,
};

use crate::model::{ModelParams, MotionModel};

/// Runtime handle for one activation of an animation spec.
pub type InstanceId = u64;

/// Everything the tick thread needs to run one instance, validated on the
/// control thread before crossing over.
pub struct StartInstance {
    pub instance: InstanceId,
    pub spec: Arc<AnimationSpec>,
    pub model: MotionModel,
    pub params: ModelParams,
    /// Effective target set (overrides applied, unknown tracks removed).
    pub tracks: Vec<TrackId>,
    pub speed: f64,
    pub loop_enabled: bool,
    pub ping_pong: bool,
    pub reverse: bool,
}

/// One track's leg of a preset transition, fully timed.
#[derive(Debug, Clone)]
pub struct TrackRamp {
    pub track: TrackId,
    /// None: sample the track's position when the transition activates.
    pub from: Option<Position>,
    pub to: Position,
    pub start_offset: f32,
    pub duration: f32,
    pub easing: Easing,
    pub mode: InterpolationMode,
    /// Inner control points for Bezier interpolation.
    pub ctrl: Option<(Position, Position)>,
}

/// A timed morph executed on the tick thread.
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    /// Correlation token; reported back in `TransitionFinished`.
    pub token: u64,
    pub ramps: Vec<TrackRamp>,
}

/// A track's rest data, seeded from the project's track bank.
#[derive(Debug, Clone, Copy)]
pub struct TrackSeed {
    pub track: TrackId,
    pub initial: Position,
    pub current: Position,
}

pub enum EngineCmd {
    Start(Box<StartInstance>),
    /// Stop every instance of a spec. Non-immediate stops ease back to rest.
    StopSpec { spec: AnimationId, immediate: bool },
    StopInstance { instance: InstanceId, immediate: bool },
    StopAll { immediate: bool },
    /// LTP takeover: remove tracks from an instance without stopping the
    /// rest of it. An instance with no tracks left is discarded.
    ReleaseTracks { instance: InstanceId, tracks: Vec<TrackId> },
    /// Same, for a running transition.
    ReleaseTransitionTracks { token: u64, tracks: Vec<TrackId> },
    Pause { spec: AnimationId },
    Resume { spec: AnimationId },
    SetSpeed { spec: AnimationId, speed: f64 },
    SetLoop { spec: AnimationId, enabled: bool },
    Seek { spec: AnimationId, seconds: f64 },
    BeginTransition(TransitionPlan),
    /// Raw messages (protocol cues, colors, queries) routed through the
    /// dispatch queue on the tick thread.
    SendMessages(Vec<WireMessage>),
    SyncTracks(Vec<TrackSeed>),
    Shutdown,
}

/// Feedback from the tick thread, drained on the control thread.
#[derive(Debug)]
pub enum EngineFeedback {
    /// Positions emitted this tick (post-transform, post-guard).
    Positions(Vec<(TrackId, Position)>),
    Progress {
        instance: InstanceId,
        spec: AnimationId,
        progress: f32,
        loop_count: u32,
    },
    /// A finite animation ran past its duration on every track.
    InstanceCompleted { instance: InstanceId, spec: AnimationId },
    /// Stopped by command, after any return-to-rest ramp finished.
    InstanceStopped { instance: InstanceId, spec: AnimationId },
    TransitionFinished { token: u64 },
    /// The tick body panicked; all instances were dropped and the loop
    /// restarted.
    TickPanicked { dropped: usize },
}

/// Consistent per-tick view of emitted positions, for callers that keep
/// their own track bank in sync.
pub fn fold_positions(feedback: &[EngineFeedback]) -> HashMap<TrackId, Position> {
    let mut out = HashMap::new();
    for item in feedback {
        if let EngineFeedback::Positions(batch) = item {
            for (track, pos) in batch {
                out.insert(*track, *pos);
            }
        }
    }
    out
}
