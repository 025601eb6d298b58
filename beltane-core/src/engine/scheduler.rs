//! The tick thread: advances instances and transitions, feeds the dispatch
//! layer, reports back to the control thread.
//!
//! Commands are prioritized over ticking via `select!`; the tick body runs
//! under `catch_unwind` so a misbehaving model cannot take the loop down.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use beltane_types::{interpolate, Easing, Position, TrackId};
use crossbeam_channel::Receiver;

use crate::wire::{protocol, DeviceLink};

use super::commands::{EngineCmd, EngineFeedback, TrackRamp, TransitionPlan};
use super::instance::AnimationInstance;
use super::pipeline;

struct RampState {
    ramp: TrackRamp,
    /// Resolved on the first tick the ramp is active.
    from: Option<Position>,
    done: bool,
}

struct ActiveTransition {
    token: u64,
    elapsed: f64,
    ramps: Vec<RampState>,
}

pub(crate) struct Scheduler {
    cmd_rx: Receiver<EngineCmd>,
    feedback_tx: Sender<EngineFeedback>,
    link: DeviceLink,
    instances: Vec<AnimationInstance>,
    transitions: Vec<ActiveTransition>,
    /// Initial positions per track: rest targets and relative-transform bases.
    rest: HashMap<TrackId, Position>,
    /// Last emitted (or seeded) position per track.
    current: HashMap<TrackId, Position>,
    tick_interval: Duration,
    last_tick: Instant,
    return_duration: f32,
    return_easing: Easing,
    /// Arm a transport buffer reset for when the running set drains.
    reset_when_idle: bool,
}

impl Scheduler {
    pub(crate) fn new(
        cmd_rx: Receiver<EngineCmd>,
        feedback_tx: Sender<EngineFeedback>,
        link: DeviceLink,
        tick_hz: u32,
        return_ms: u64,
        return_easing: Easing,
    ) -> Self {
        Self {
            cmd_rx,
            feedback_tx,
            link,
            instances: Vec::new(),
            transitions: Vec::new(),
            rest: HashMap::new(),
            current: HashMap::new(),
            tick_interval: Duration::from_secs_f64(1.0 / tick_hz.max(1) as f64),
            last_tick: Instant::now(),
            return_duration: return_ms as f32 / 1000.0,
            return_easing,
            reset_when_idle: false,
        }
    }

    pub(crate) fn run(mut self) {
        loop {
            let remaining = self.tick_interval.saturating_sub(self.last_tick.elapsed());
            crossbeam_channel::select! {
                recv(self.cmd_rx) -> result => {
                    match result {
                        Ok(cmd) => {
                            if self.handle_cmd(cmd) {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                default(remaining) => {
                    let dt = self.last_tick.elapsed().as_secs_f64();
                    let now = Instant::now();
                    self.last_tick = now;
                    let guarded = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        self.tick(dt, now);
                    }));
                    if guarded.is_err() {
                        self.recover_from_panic();
                    }
                }
            }
        }
        log::debug!(target: "engine::scheduler", "tick loop shut down");
    }

    /// All errors inside a tick degrade to per-track skips; nothing escapes.
    fn tick(&mut self, dt: f64, now: Instant) {
        let mut emitted: Vec<(TrackId, Position)> = Vec::new();
        let mut finished_instances: Vec<usize> = Vec::new();

        for (index, instance) in self.instances.iter_mut().enumerate() {
            let result = pipeline::advance_instance(instance, dt, &self.rest);
            emitted.extend_from_slice(&result.positions);
            if instance.is_active() && !result.completed {
                let _ = self.feedback_tx.send(EngineFeedback::Progress {
                    instance: instance.id,
                    spec: instance.spec.id,
                    progress: instance.progress,
                    loop_count: instance.loop_count,
                });
            }
            if result.completed {
                let _ = self.feedback_tx.send(EngineFeedback::InstanceCompleted {
                    instance: instance.id,
                    spec: instance.spec.id,
                });
                finished_instances.push(index);
            } else if result.ramp_done {
                let _ = self.feedback_tx.send(EngineFeedback::InstanceStopped {
                    instance: instance.id,
                    spec: instance.spec.id,
                });
                finished_instances.push(index);
            }
        }
        for index in finished_instances.into_iter().rev() {
            // Per-track model state dies with the instance.
            self.instances.remove(index);
        }

        let mut finished_transitions: Vec<usize> = Vec::new();
        for (index, transition) in self.transitions.iter_mut().enumerate() {
            transition.elapsed += dt;
            let mut all_done = true;
            for state in &mut transition.ramps {
                if state.done {
                    continue;
                }
                let local = transition.elapsed - state.ramp.start_offset as f64;
                if local < 0.0 {
                    all_done = false;
                    continue;
                }
                let from = *state.from.get_or_insert_with(|| {
                    self.current
                        .get(&state.ramp.track)
                        .copied()
                        .or(self.rest.get(&state.ramp.track).copied())
                        .unwrap_or(Position::ORIGIN)
                });
                let u = if state.ramp.duration <= 0.0 {
                    1.0
                } else {
                    (local / state.ramp.duration as f64).min(1.0) as f32
                };
                let pos = if u >= 1.0 {
                    state.done = true;
                    state.ramp.to
                } else {
                    all_done = false;
                    let eased = state.ramp.easing.apply(u);
                    interpolate(from, state.ramp.to, eased, state.ramp.mode, state.ramp.ctrl)
                };
                emitted.push((state.ramp.track, pos));
            }
            if all_done {
                let _ = self
                    .feedback_tx
                    .send(EngineFeedback::TransitionFinished { token: transition.token });
                finished_transitions.push(index);
            }
        }
        for index in finished_transitions.into_iter().rev() {
            self.transitions.remove(index);
        }

        if !emitted.is_empty() {
            for (track, pos) in &emitted {
                self.current.insert(*track, *pos);
                self.link.dispatch().propose(*track, *pos);
            }
            let _ = self.feedback_tx.send(EngineFeedback::Positions(emitted));
        }
        self.link.dispatch().flush(now);

        if self.reset_when_idle && self.instances.is_empty() && self.transitions.is_empty() {
            self.reset_when_idle = false;
            self.link.reset_buffers();
        }
    }

    fn recover_from_panic(&mut self) {
        let dropped = self.instances.len() + self.transitions.len();
        log::error!(
            target: "engine::scheduler",
            "tick panicked; dropping {} running animation(s) and restarting the loop",
            dropped
        );
        for instance in &self.instances {
            let _ = self.feedback_tx.send(EngineFeedback::InstanceStopped {
                instance: instance.id,
                spec: instance.spec.id,
            });
        }
        for transition in &self.transitions {
            let _ = self
                .feedback_tx
                .send(EngineFeedback::TransitionFinished { token: transition.token });
        }
        self.instances.clear();
        self.transitions.clear();
        let _ = self.feedback_tx.send(EngineFeedback::TickPanicked { dropped });
    }

    fn stop_instance_at(&mut self, index: usize, immediate: bool) {
        if immediate {
            let instance = self.instances.remove(index);
            let _ = self.feedback_tx.send(EngineFeedback::InstanceStopped {
                instance: instance.id,
                spec: instance.spec.id,
            });
        } else {
            let instance = &mut self.instances[index];
            instance.begin_stop(instance.wall, self.return_duration, self.return_easing);
        }
    }

    fn handle_cmd(&mut self, cmd: EngineCmd) -> bool {
        match cmd {
            EngineCmd::Start(start) => {
                log::debug!(
                    target: "engine::scheduler",
                    "starting instance {} of spec {} on {} track(s)",
                    start.instance,
                    start.spec.id,
                    start.tracks.len()
                );
                self.instances.push(AnimationInstance::new(*start));
            }
            EngineCmd::StopSpec { spec, immediate } => {
                self.reset_when_idle = true;
                for index in (0..self.instances.len()).rev() {
                    if self.instances[index].spec.id == spec {
                        self.stop_instance_at(index, immediate);
                    }
                }
            }
            EngineCmd::StopInstance { instance, immediate } => {
                self.reset_when_idle = true;
                for index in (0..self.instances.len()).rev() {
                    if self.instances[index].id == instance {
                        self.stop_instance_at(index, immediate);
                    }
                }
            }
            EngineCmd::StopAll { immediate } => {
                self.reset_when_idle = true;
                for index in (0..self.instances.len()).rev() {
                    self.stop_instance_at(index, immediate);
                }
                for transition in self.transitions.drain(..) {
                    let _ = self
                        .feedback_tx
                        .send(EngineFeedback::TransitionFinished { token: transition.token });
                }
            }
            EngineCmd::ReleaseTracks { instance, tracks } => {
                for index in (0..self.instances.len()).rev() {
                    if self.instances[index].id != instance {
                        continue;
                    }
                    if self.instances[index].release_tracks(&tracks) {
                        let removed = self.instances.remove(index);
                        let _ = self.feedback_tx.send(EngineFeedback::InstanceStopped {
                            instance: removed.id,
                            spec: removed.spec.id,
                        });
                    }
                }
            }
            EngineCmd::ReleaseTransitionTracks { token, tracks } => {
                for index in (0..self.transitions.len()).rev() {
                    if self.transitions[index].token != token {
                        continue;
                    }
                    self.transitions[index]
                        .ramps
                        .retain(|state| !tracks.contains(&state.ramp.track));
                    if self.transitions[index].ramps.iter().all(|s| s.done)
                        || self.transitions[index].ramps.is_empty()
                    {
                        let finished = self.transitions.remove(index);
                        let _ = self
                            .feedback_tx
                            .send(EngineFeedback::TransitionFinished { token: finished.token });
                    }
                }
            }
            EngineCmd::Pause { spec } => {
                for instance in &mut self.instances {
                    if instance.spec.id == spec
                        && instance.status == super::instance::InstanceStatus::Running
                    {
                        instance.status = super::instance::InstanceStatus::Paused;
                    }
                }
            }
            EngineCmd::Resume { spec } => {
                for instance in &mut self.instances {
                    if instance.spec.id == spec
                        && instance.status == super::instance::InstanceStatus::Paused
                    {
                        instance.status = super::instance::InstanceStatus::Running;
                    }
                }
            }
            EngineCmd::SetSpeed { spec, speed } => {
                for instance in &mut self.instances {
                    if instance.spec.id == spec {
                        instance.speed = speed.max(0.0);
                    }
                }
            }
            EngineCmd::SetLoop { spec, enabled } => {
                for instance in &mut self.instances {
                    if instance.spec.id == spec {
                        instance.loop_enabled = enabled;
                    }
                }
            }
            EngineCmd::Seek { spec, seconds } => {
                for instance in &mut self.instances {
                    if instance.spec.id == spec {
                        instance.elapsed = seconds.max(0.0);
                    }
                }
            }
            EngineCmd::BeginTransition(plan) => {
                self.begin_transition(plan);
            }
            EngineCmd::SendMessages(messages) => {
                let now = Instant::now();
                for msg in &messages {
                    let osc = protocol::from_wire_message(msg);
                    self.link.dispatch().send_message(osc, now);
                }
            }
            EngineCmd::SyncTracks(seeds) => {
                for seed in seeds {
                    self.rest.insert(seed.track, seed.initial);
                    self.current.entry(seed.track).or_insert(seed.current);
                }
            }
            EngineCmd::Shutdown => return true,
        }
        false
    }

    fn begin_transition(&mut self, plan: TransitionPlan) {
        let ramps = plan
            .ramps
            .into_iter()
            .map(|ramp| RampState { from: ramp.from, ramp, done: false })
            .collect();
        self.transitions.push(ActiveTransition {
            token: plan.token,
            elapsed: 0.0,
            ramps,
        });
    }
}
