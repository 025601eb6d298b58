//! Runtime state for one activation of an animation spec.

use std::collections::HashMap;
use std::sync::Arc;

use beltane_types::{AnimationSpec, Easing, Position, TrackId};

use crate::model::{ModelParams, ModelState, MotionModel};

use super::commands::{InstanceId, StartInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running,
    Paused,
    /// Easing back toward rest positions; removed when the ramp ends.
    Stopping,
    Completed,
}

/// Return-to-rest ramp started by a non-immediate stop.
pub struct StopRamp {
    /// Instance-clock seconds when the stop landed.
    pub started: f64,
    pub duration: f32,
    pub easing: Easing,
    /// Last emitted position per track at the moment of the stop.
    pub from: HashMap<TrackId, Position>,
}

pub struct AnimationInstance {
    pub id: InstanceId,
    pub spec: Arc<AnimationSpec>,
    pub model: MotionModel,
    pub params: ModelParams,
    pub tracks: Vec<TrackId>,
    /// Animation-time seconds, advanced by `dt * speed` while running.
    pub elapsed: f64,
    /// Wall seconds since the instance started, drives the stop ramp.
    pub wall: f64,
    pub speed: f64,
    pub loop_enabled: bool,
    pub ping_pong: bool,
    pub reverse: bool,
    pub status: InstanceStatus,
    /// Lazily-initialized per-track model state; owned here, destroyed with
    /// the instance.
    pub track_state: HashMap<TrackId, Option<ModelState>>,
    /// Last emitted position per track (non-finite guard, stop ramp seeds).
    pub last_positions: HashMap<TrackId, Position>,
    /// Anchor position from the previous tick, for formation heading.
    pub prev_anchor: Option<Position>,
    /// State slot for the formation anchor (formation transforms evaluate
    /// the model once per tick, not per track).
    pub anchor_state: Option<ModelState>,
    pub loop_count: u32,
    pub progress: f32,
    pub stop_ramp: Option<StopRamp>,
}

impl AnimationInstance {
    pub fn new(start: StartInstance) -> Self {
        Self {
            id: start.instance,
            spec: start.spec,
            model: start.model,
            params: start.params,
            tracks: start.tracks,
            elapsed: 0.0,
            wall: 0.0,
            speed: start.speed,
            loop_enabled: start.loop_enabled,
            ping_pong: start.ping_pong,
            reverse: start.reverse,
            status: InstanceStatus::Running,
            track_state: HashMap::new(),
            last_positions: HashMap::new(),
            prev_anchor: None,
            anchor_state: None,
            loop_count: 0,
            progress: 0.0,
            stop_ramp: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            InstanceStatus::Running | InstanceStatus::Paused | InstanceStatus::Stopping
        )
    }

    /// Begin the eased return to rest. Idempotent: a second stop while
    /// already stopping changes nothing.
    pub fn begin_stop(&mut self, wall: f64, duration: f32, easing: Easing) {
        if self.status == InstanceStatus::Stopping {
            return;
        }
        self.status = InstanceStatus::Stopping;
        self.stop_ramp = Some(StopRamp {
            started: wall,
            duration,
            easing,
            from: self.last_positions.clone(),
        });
    }

    /// Drop tracks from this instance (LTP takeover). Their model state goes
    /// with them. Returns true when no tracks remain.
    pub fn release_tracks(&mut self, tracks: &[TrackId]) -> bool {
        self.tracks.retain(|t| !tracks.contains(t));
        for t in tracks {
            self.track_state.remove(t);
            self.last_positions.remove(t);
            if let Some(ramp) = &mut self.stop_ramp {
                ramp.from.remove(t);
            }
        }
        self.tracks.is_empty()
    }
}
