//! EngineHandle: control-thread interface to the animation engine.
//!
//! Owns the command/feedback channels; the scheduler and the device link
//! live on the tick thread. Start-time validation (model lookup, parameter
//! checks) happens here so the tick loop only ever sees runnable instances.

pub mod commands;
mod instance;
mod pipeline;
mod scheduler;

pub use commands::{
    fold_positions, EngineCmd, EngineFeedback, InstanceId, StartInstance, TrackRamp, TrackSeed,
    TransitionPlan,
};
pub use instance::{AnimationInstance, InstanceStatus};

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use beltane_types::{AnimationId, AnimationSpec, TrackBank, TrackId, WireMessage};
use crossbeam_channel::Sender;

use crate::config::Config;
use crate::error::EngineError;
use crate::model::ModelRegistry;
use crate::wire::DeviceLink;

/// Trigger-time overrides carried by an animation cue.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub tracks: Option<Vec<TrackId>>,
    pub speed: Option<f64>,
    pub loop_override: Option<bool>,
    pub reverse: bool,
}

pub struct EngineHandle {
    cmd_tx: Sender<EngineCmd>,
    feedback_rx: Receiver<EngineFeedback>,
    next_instance: InstanceId,
    next_token: u64,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Move the device link onto a fresh tick thread and return the handle.
    pub fn spawn(link: DeviceLink, config: &Config) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (feedback_tx, feedback_rx) = mpsc::channel();
        let tick_hz = config.tick_hz();
        let return_ms = config.return_ms();
        let return_easing = config.return_easing();

        let join_handle = thread::Builder::new()
            .name("engine-tick".into())
            .spawn(move || {
                scheduler::Scheduler::new(
                    cmd_rx,
                    feedback_tx,
                    link,
                    tick_hz,
                    return_ms,
                    return_easing,
                )
                .run();
            })
            .expect("failed to spawn engine-tick thread");

        Self {
            cmd_tx,
            feedback_rx,
            next_instance: 1,
            next_token: 1,
            thread: Some(join_handle),
        }
    }

    fn send(&self, cmd: EngineCmd) {
        if self.cmd_tx.send(cmd).is_err() {
            log::error!(target: "engine", "tick thread is gone, command dropped");
        }
    }

    /// Validate and start an animation. The caller supplies the effective
    /// track set (unknown tracks already filtered).
    pub fn start_animation(
        &mut self,
        spec: &AnimationSpec,
        registry: &ModelRegistry,
        options: StartOptions,
    ) -> Result<InstanceId, EngineError> {
        let model = registry.get(&spec.model_id)?.clone();
        let params = model.validate(&spec.parameters)?;
        let tracks = options.tracks.unwrap_or_else(|| spec.tracks.clone());
        let instance = self.next_instance;
        self.next_instance += 1;
        self.send(EngineCmd::Start(Box::new(StartInstance {
            instance,
            spec: Arc::new(spec.clone()),
            model,
            params,
            tracks,
            speed: options.speed.unwrap_or(1.0),
            loop_enabled: options.loop_override.unwrap_or(spec.loop_enabled),
            ping_pong: spec.ping_pong,
            reverse: options.reverse,
        })));
        Ok(instance)
    }

    pub fn stop_spec(&self, spec: AnimationId, immediate: bool) {
        self.send(EngineCmd::StopSpec { spec, immediate });
    }

    pub fn stop_instance(&self, instance: InstanceId, immediate: bool) {
        self.send(EngineCmd::StopInstance { instance, immediate });
    }

    /// Panic-stop: everything down, no easing when `immediate`.
    pub fn stop_all(&self, immediate: bool) {
        self.send(EngineCmd::StopAll { immediate });
    }

    pub fn release_tracks(&self, instance: InstanceId, tracks: Vec<TrackId>) {
        self.send(EngineCmd::ReleaseTracks { instance, tracks });
    }

    pub fn release_transition_tracks(&self, token: u64, tracks: Vec<TrackId>) {
        self.send(EngineCmd::ReleaseTransitionTracks { token, tracks });
    }

    pub fn pause(&self, spec: AnimationId) {
        self.send(EngineCmd::Pause { spec });
    }

    pub fn resume(&self, spec: AnimationId) {
        self.send(EngineCmd::Resume { spec });
    }

    pub fn set_speed(&self, spec: AnimationId, speed: f64) {
        self.send(EngineCmd::SetSpeed { spec, speed });
    }

    pub fn set_loop(&self, spec: AnimationId, enabled: bool) {
        self.send(EngineCmd::SetLoop { spec, enabled });
    }

    pub fn seek(&self, spec: AnimationId, seconds: f64) {
        self.send(EngineCmd::Seek { spec, seconds });
    }

    /// Hand a fully-timed transition to the tick thread. Returns the token
    /// reported back in `TransitionFinished`.
    pub fn begin_transition(&mut self, ramps: Vec<TrackRamp>) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.send(EngineCmd::BeginTransition(TransitionPlan { token, ramps }));
        token
    }

    pub fn send_messages(&self, messages: Vec<WireMessage>) {
        self.send(EngineCmd::SendMessages(messages));
    }

    /// Push the project's track bank to the tick thread (initial positions
    /// for return-to-rest and relative transforms).
    pub fn sync_tracks(&self, bank: &TrackBank) {
        let seeds = bank
            .tracks
            .iter()
            .map(|t| TrackSeed {
                track: t.id,
                initial: t.rest_position(),
                current: t.current_position,
            })
            .collect();
        self.send(EngineCmd::SyncTracks(seeds));
    }

    /// Non-blocking drain of everything the tick thread reported.
    pub fn drain_feedback(&self) -> Vec<EngineFeedback> {
        let mut out = Vec::new();
        while let Ok(item) = self.feedback_rx.try_recv() {
            out.push(item);
        }
        out
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(EngineCmd::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
