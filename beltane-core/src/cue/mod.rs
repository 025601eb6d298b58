//! Cue executor: discrete triggerable actions with Last-Takes-Precedence
//! track arbitration.
//!
//! All mutation happens on the control thread. The tick thread only ever
//! sees validated instances and fully-timed transition plans; ownership
//! release rides back on the engine's feedback channel.

pub mod transition;

pub use transition::{build_ramps, RampTarget};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use beltane_types::{
    Cue, CueId, CueKind, CueStatus, FollowAction, Position, PresetCue, PresetId, PresetTransition,
    TrackId,
};

use crate::config::{Config, PriorityMode};
use crate::engine::{EngineFeedback, EngineHandle, InstanceId, StartOptions};
use crate::error::EngineError;
use crate::model::ModelRegistry;
use crate::project::Project;
use crate::wire::Inbound;

/// What a running cue is doing on the tick thread. Protocol cues complete
/// within the trigger call and never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CueEffect {
    Animation { instance: InstanceId },
    Transition { token: u64 },
}

#[derive(Debug)]
struct ActiveCue {
    status: CueStatus,
    effect: CueEffect,
    /// Spec behind an animation effect, for wire-driven resume.
    spec: Option<beltane_types::AnimationId>,
    /// Tracks this cue still owns.
    tracks: Vec<TrackId>,
    follow: FollowAction,
    follow_delay: f32,
}

/// Process-wide execution state: the priority mode, the set of active cues,
/// and which cue owns which track.
pub struct ExecutionContext {
    pub priority_mode: PriorityMode,
    pub default_transition: PresetTransition,
    active: HashMap<CueId, ActiveCue>,
    ownership: HashMap<TrackId, CueId>,
}

impl ExecutionContext {
    fn new(priority_mode: PriorityMode) -> Self {
        Self {
            priority_mode,
            default_transition: PresetTransition::default(),
            active: HashMap::new(),
            ownership: HashMap::new(),
        }
    }

    pub fn owner(&self, track: TrackId) -> Option<CueId> {
        self.ownership.get(&track).copied()
    }

    pub fn status(&self, cue: CueId) -> CueStatus {
        self.active.get(&cue).map(|a| a.status).unwrap_or(CueStatus::Idle)
    }

    pub fn owned_tracks(&self, cue: CueId) -> Vec<TrackId> {
        self.active.get(&cue).map(|a| a.tracks.clone()).unwrap_or_default()
    }

    fn claim(&mut self, cue: CueId, tracks: &[TrackId]) {
        for track in tracks {
            self.ownership.insert(*track, cue);
        }
    }

    fn release_cue(&mut self, cue: CueId) {
        self.ownership.retain(|_, owner| *owner != cue);
        self.active.remove(&cue);
    }

    fn clear(&mut self) {
        self.active.clear();
        self.ownership.clear();
    }
}

/// A follow action waiting out its delay.
struct PendingFollow {
    due: Instant,
    source: CueId,
    action: FollowAction,
}

pub struct CueEngine {
    registry: Arc<ModelRegistry>,
    pub engine: EngineHandle,
    pub context: ExecutionContext,
    pending_follows: Vec<PendingFollow>,
}

impl CueEngine {
    pub fn new(registry: Arc<ModelRegistry>, engine: EngineHandle, config: &Config) -> Self {
        Self {
            registry,
            engine,
            context: ExecutionContext::new(config.priority_mode()),
            pending_follows: Vec::new(),
        }
    }

    /// Trigger a cue by id, from any source (manual, hotkey, inbound wire,
    /// follow action).
    pub fn trigger(&mut self, project: &mut Project, cue_id: CueId) -> Result<(), EngineError> {
        let Some(cue) = project.find_cue(cue_id).cloned() else {
            log::warn!(target: "cue", "no cue with id {}", cue_id);
            return Ok(());
        };
        self.trigger_cue(project, &cue)
    }

    pub fn trigger_cue(&mut self, project: &mut Project, cue: &Cue) -> Result<(), EngineError> {
        if !cue.enabled {
            log::debug!(target: "cue", "cue {} '{}' is disabled, ignoring", cue.id, cue.name);
            return Ok(());
        }
        // Re-triggering a running cue restarts it.
        if self.context.active.contains_key(&cue.id) {
            self.stop(cue.id, true);
            self.context.release_cue(cue.id);
        }
        match &cue.kind {
            CueKind::Animation(payload) => {
                let spec = project
                    .find_animation(payload.spec)
                    .ok_or(EngineError::AnimationSpecNotFound(payload.spec))?
                    .clone();
                let requested = payload.tracks.clone().unwrap_or_else(|| spec.tracks.clone());
                let tracks = self.filter_known(project, &requested);
                if tracks.is_empty() {
                    log::warn!(target: "cue", "cue {} has no known target tracks", cue.id);
                    return Ok(());
                }
                // Seed rest positions before the instance's first tick.
                self.engine.sync_tracks(&project.tracks);
                let instance = self.engine.start_animation(
                    &spec,
                    &self.registry,
                    StartOptions {
                        tracks: Some(tracks.clone()),
                        speed: payload.speed.map(|s| s as f64),
                        loop_override: payload.loop_override,
                        reverse: payload.reverse,
                    },
                )?;
                // LTP: contested tracks leave their old owners. The release
                // lands on the tick thread behind the start, so within one
                // tick the newest proposal wins.
                self.take_over(&tracks, cue.id);
                self.context.claim(cue.id, &tracks);
                self.context.active.insert(
                    cue.id,
                    ActiveCue {
                        status: CueStatus::Running,
                        effect: CueEffect::Animation { instance },
                        spec: Some(spec.id),
                        tracks,
                        follow: cue.follow,
                        follow_delay: cue.follow_delay,
                    },
                );
                Ok(())
            }
            CueKind::Protocol(payload) => {
                // Best-effort burst; transport errors only touch the stats.
                self.engine.send_messages(payload.messages.clone());
                self.queue_follow(cue);
                Ok(())
            }
            CueKind::Preset(payload) => self.trigger_preset_cue(project, cue, payload),
        }
    }

    fn trigger_preset_cue(
        &mut self,
        project: &mut Project,
        cue: &Cue,
        payload: &PresetCue,
    ) -> Result<(), EngineError> {
        let preset = project
            .presets
            .get(payload.preset)
            .ok_or(EngineError::PresetNotFound(payload.preset))?
            .clone();

        let mut targets: Vec<RampTarget> = Vec::new();
        for track in &preset.track_ids {
            let Some(state) = project.tracks.get(*track) else {
                log::warn!(target: "cue", "preset {} names unknown track {}, skipping", preset.id, track);
                continue;
            };
            let to = payload
                .overrides
                .get(track)
                .copied()
                .or_else(|| preset.positions.get(track).copied());
            let Some(to) = to else { continue };
            targets.push(RampTarget { track: *track, from: state.current_position, to });
        }
        if targets.is_empty() {
            log::warn!(target: "cue", "preset cue {} resolved to no tracks", cue.id);
            return Ok(());
        }

        let track_ids: Vec<TrackId> = targets.iter().map(|t| t.track).collect();
        if payload.interrupt_animations {
            // Immediate per-track release; the transition supplies its own
            // easing, so return-to-rest would fight it.
            self.take_over(&track_ids, cue.id);
        } else {
            // Leave running animations alone: transition only the free tracks.
            let contested: Vec<TrackId> = track_ids
                .iter()
                .copied()
                .filter(|t| {
                    self.context.owner(*t).map(|owner| owner != cue.id).unwrap_or(false)
                })
                .collect();
            targets.retain(|t| !contested.contains(&t.track));
            if targets.is_empty() {
                return Ok(());
            }
        }

        let owned: Vec<TrackId> = targets.iter().map(|t| t.track).collect();
        let ramps = build_ramps(&targets, &payload.transition, None);
        let token = self.engine.begin_transition(ramps);
        self.context.claim(cue.id, &owned);
        self.context.active.insert(
            cue.id,
            ActiveCue {
                status: CueStatus::Running,
                effect: CueEffect::Transition { token },
                spec: None,
                tracks: owned,
                follow: cue.follow,
                follow_delay: cue.follow_delay,
            },
        );
        Ok(())
    }

    /// Direct preset recall outside any cue. No ownership is taken; tracks
    /// currently owned by a cue are left to it.
    pub fn apply_preset(
        &mut self,
        project: &mut Project,
        preset_id: PresetId,
        transition: &PresetTransition,
        overrides: &HashMap<TrackId, Position>,
    ) -> Result<u64, EngineError> {
        let preset = project
            .presets
            .get(preset_id)
            .ok_or(EngineError::PresetNotFound(preset_id))?
            .clone();
        let mut targets = Vec::new();
        for track in &preset.track_ids {
            let Some(state) = project.tracks.get(*track) else { continue };
            if self.context.owner(*track).is_some() {
                continue;
            }
            let to = overrides
                .get(track)
                .copied()
                .or_else(|| preset.positions.get(track).copied());
            let Some(to) = to else { continue };
            targets.push(RampTarget { track: *track, from: state.current_position, to });
        }
        let ramps = build_ramps(&targets, transition, None);
        Ok(self.engine.begin_transition(ramps))
    }

    /// LTP: strip contested tracks from their current owners. Only the
    /// per-track effect stops; an owner keeps running on its other tracks.
    fn take_over(&mut self, tracks: &[TrackId], new_owner: CueId) {
        let mut stolen: HashMap<CueId, Vec<TrackId>> = HashMap::new();
        for track in tracks {
            if let Some(owner) = self.context.owner(*track) {
                if owner != new_owner {
                    stolen.entry(owner).or_default().push(*track);
                }
            }
        }
        for (owner, taken) in stolen {
            let Some(active) = self.context.active.get_mut(&owner) else { continue };
            active.tracks.retain(|t| !taken.contains(t));
            match active.effect.clone() {
                CueEffect::Animation { instance } => {
                    self.engine.release_tracks(instance, taken.clone());
                }
                CueEffect::Transition { token } => {
                    self.engine.release_transition_tracks(token, taken.clone());
                }
            }
            if active.tracks.is_empty() {
                active.status = CueStatus::Completing;
            }
            for track in taken {
                self.context.ownership.remove(&track);
            }
            log::debug!(target: "cue", "cue {} lost tracks to cue {}", owner, new_owner);
        }
    }

    fn filter_known(&self, project: &Project, requested: &[TrackId]) -> Vec<TrackId> {
        let mut known = Vec::new();
        for track in requested {
            if project.tracks.contains(*track) {
                known.push(*track);
            } else {
                log::warn!(target: "cue", "{}", EngineError::UnknownTrack(*track));
            }
        }
        known
    }

    /// Trigger every enabled cue bound to a host-side trigger string
    /// (hotkeys and the like; the string is opaque to the engine).
    pub fn trigger_binding(&mut self, project: &mut Project, binding: &str) {
        let bound: Vec<CueId> = project
            .cue_lists
            .iter()
            .flat_map(|list| list.cues.iter())
            .filter(|c| c.triggers.iter().any(|t| t == binding))
            .map(|c| c.id)
            .collect();
        for cue_id in bound {
            if let Err(e) = self.trigger(project, cue_id) {
                log::warn!(target: "cue", "binding '{}' failed on cue {}: {}", binding, cue_id, e);
            }
        }
    }

    /// GO on a cue list: fire the cue under the playhead and advance.
    pub fn go(&mut self, project: &mut Project, list_id: u32) -> Result<Option<CueId>, EngineError> {
        let Some(list) = project.cue_lists.iter_mut().find(|l| l.id == list_id) else {
            return Ok(None);
        };
        let Some(cue_id) = list.go() else {
            return Ok(None);
        };
        self.trigger(project, cue_id)?;
        Ok(Some(cue_id))
    }

    /// Panic-stop: every cue to Idle, all ownership cleared, engine stopped
    /// hard.
    pub fn panic_stop(&mut self) {
        log::warn!(target: "cue", "panic stop: clearing {} active cue(s)", self.context.active.len());
        self.engine.stop_all(true);
        self.pending_follows.clear();
        self.context.clear();
    }

    /// Stop one cue's effect (eased for animations).
    pub fn stop(&mut self, cue_id: CueId, immediate: bool) {
        let Some(active) = self.context.active.get_mut(&cue_id) else { return };
        active.status = CueStatus::Completing;
        match active.effect.clone() {
            CueEffect::Animation { instance } => self.engine.stop_instance(instance, immediate),
            CueEffect::Transition { token } => {
                let tracks = active.tracks.clone();
                self.engine.release_transition_tracks(token, tracks);
            }
        }
    }

    /// Drain engine feedback: update track positions, retire finished cues,
    /// queue follow actions. Call once per host loop iteration.
    pub fn process_feedback(&mut self, project: &mut Project) -> Vec<EngineFeedback> {
        let feedback = self.engine.drain_feedback();
        for item in &feedback {
            match item {
                EngineFeedback::Positions(batch) => {
                    for (track, pos) in batch {
                        if let Some(t) = project.tracks.get_mut(*track) {
                            t.current_position = *pos;
                        }
                    }
                }
                EngineFeedback::InstanceCompleted { instance, .. }
                | EngineFeedback::InstanceStopped { instance, .. } => {
                    self.retire(CueEffect::Animation { instance: *instance });
                }
                EngineFeedback::TransitionFinished { token } => {
                    self.retire(CueEffect::Transition { token: *token });
                }
                EngineFeedback::TickPanicked { dropped } => {
                    log::error!(target: "cue", "tick loop panicked, {} animation(s) dropped", dropped);
                    self.pending_follows.clear();
                    self.context.clear();
                }
                EngineFeedback::Progress { .. } => {}
            }
        }
        feedback
    }

    fn retire(&mut self, effect: CueEffect) {
        let finished: Option<CueId> = self
            .context
            .active
            .iter()
            .find(|(_, active)| active.effect == effect)
            .map(|(id, _)| *id);
        let Some(cue_id) = finished else { return };
        let (follow, delay) = {
            let active = &self.context.active[&cue_id];
            (active.follow, active.follow_delay)
        };
        self.context.release_cue(cue_id);
        self.push_follow(cue_id, follow, delay);
    }

    fn queue_follow(&mut self, cue: &Cue) {
        self.push_follow(cue.id, cue.follow, cue.follow_delay);
    }

    fn push_follow(&mut self, source: CueId, action: FollowAction, delay: f32) {
        if action == FollowAction::None {
            return;
        }
        self.pending_follows.push(PendingFollow {
            due: Instant::now() + Duration::from_secs_f32(delay.max(0.0)),
            source,
            action,
        });
    }

    /// Fire any follow actions whose delay has elapsed.
    pub fn maintain(&mut self, project: &mut Project, now: Instant) {
        let due: Vec<PendingFollow> = {
            let mut due = Vec::new();
            let mut index = 0;
            while index < self.pending_follows.len() {
                if self.pending_follows[index].due <= now {
                    due.push(self.pending_follows.remove(index));
                } else {
                    index += 1;
                }
            }
            due
        };
        for follow in due {
            let target = match follow.action {
                FollowAction::None => continue,
                FollowAction::Goto(id) => Some(id),
                FollowAction::Next => project.next_cue_after(follow.source),
            };
            if let Some(target) = target {
                if let Err(e) = self.trigger(project, target) {
                    log::warn!(target: "cue", "follow action from cue {} failed: {}", follow.source, e);
                }
            }
        }
    }

    /// Apply inbound control messages from the wire.
    pub fn handle_control(&mut self, project: &mut Project, messages: Vec<Inbound>) {
        for msg in messages {
            match msg {
                Inbound::CueGo { cue } => {
                    if let Err(e) = self.trigger(project, cue) {
                        log::warn!(target: "cue", "wire trigger of cue {} failed: {}", cue, e);
                    }
                }
                Inbound::AnimationPlay { animation } => {
                    // Resume if an instance exists, otherwise start fresh.
                    if self.has_running_spec(animation) {
                        self.engine.resume(animation);
                    } else if let Some(spec) = project.find_animation(animation).cloned() {
                        let tracks = self.filter_known(project, &spec.tracks);
                        if !tracks.is_empty() {
                            self.engine.sync_tracks(&project.tracks);
                            match self.engine.start_animation(
                                &spec,
                                &self.registry,
                                StartOptions { tracks: Some(tracks), ..Default::default() },
                            ) {
                                Ok(_) => {}
                                Err(e) => {
                                    log::warn!(target: "cue", "wire play of animation {} failed: {}", animation, e)
                                }
                            }
                        }
                    }
                }
                Inbound::AnimationPause { animation } => self.engine.pause(animation),
                Inbound::AnimationStop { animation } => self.engine.stop_spec(animation, false),
                Inbound::AnimationLoop { animation, enabled } => {
                    self.engine.set_loop(animation, enabled)
                }
                Inbound::AnimationSpeed { animation, speed } => {
                    self.engine.set_speed(animation, speed as f64)
                }
                Inbound::AnimationTime { animation, seconds } => {
                    self.engine.seek(animation, seconds as f64)
                }
                _ => {}
            }
        }
    }

    fn has_running_spec(&self, spec: beltane_types::AnimationId) -> bool {
        self.context
            .active
            .values()
            .any(|active| active.spec == Some(spec) && active.status == CueStatus::Running)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use beltane_types::{AnimationCue, AnimationSpec, CueList, ParamValue, Track};

    use crate::wire::{DeviceLink, DispatchSettings};

    use super::*;

    #[test]
    fn ownership_single_writer() {
        let mut ctx = ExecutionContext::new(PriorityMode::Ltp);
        ctx.claim(1, &[10, 11]);
        ctx.claim(2, &[11, 12]);
        assert_eq!(ctx.owner(10), Some(1));
        assert_eq!(ctx.owner(11), Some(2));
        assert_eq!(ctx.owner(12), Some(2));
    }

    #[test]
    fn release_clears_only_own_entries() {
        let mut ctx = ExecutionContext::new(PriorityMode::Ltp);
        ctx.claim(1, &[10]);
        ctx.claim(2, &[11]);
        ctx.release_cue(1);
        assert_eq!(ctx.owner(10), None);
        assert_eq!(ctx.owner(11), Some(2));
    }

    fn test_engine() -> CueEngine {
        // Nothing listens on the device port; sends vanish harmlessly.
        let link = DeviceLink::connect_to(
            "127.0.0.1:19998".parse().unwrap(),
            0,
            DispatchSettings::default(),
            2000,
        )
        .expect("link");
        let config = Config::default();
        let engine = EngineHandle::spawn(link, &config);
        CueEngine::new(Arc::new(ModelRegistry::builtin()), engine, &config)
    }

    fn test_project() -> Project {
        let mut project = Project::new(500);
        for id in 1..=3 {
            let mut track = Track::new(id, format!("track {id}"));
            track.current_position = Position::new(0.0, 0.0, 1.0);
            project.tracks.add(track);
        }

        let mut circle = AnimationSpec::new(1, "circle", "circle")
            .with_param("radius", ParamValue::Float(5.0));
        circle.duration = 10.0;
        circle.loop_enabled = true;
        circle.tracks = vec![1, 2];
        project.animations.push(circle);

        let mut osc = AnimationSpec::new(2, "wobble", "oscillator")
            .with_param("amplitude", ParamValue::Float(1.0));
        osc.duration = 10.0;
        osc.loop_enabled = true;
        osc.tracks = vec![2, 3];
        project.animations.push(osc);

        let mut list = CueList::new(1, "main");
        for (cue_id, spec) in [(100, 1), (101, 2)] {
            list.cues.push(Cue::new(
                cue_id,
                format!("anim {spec}"),
                CueKind::Animation(AnimationCue {
                    spec,
                    tracks: None,
                    speed: None,
                    loop_override: None,
                    reverse: false,
                }),
            ));
        }
        project.cue_lists.push(list);
        project
    }

    #[test]
    fn ltp_takeover_moves_contested_track() {
        let mut cues = test_engine();
        let mut project = test_project();

        cues.trigger(&mut project, 100).unwrap();
        assert_eq!(cues.context.owner(1), Some(100));
        assert_eq!(cues.context.owner(2), Some(100));

        cues.trigger(&mut project, 101).unwrap();
        // Cue 100 keeps track 1; cue 101 now owns 2 and 3.
        assert_eq!(cues.context.owner(1), Some(100));
        assert_eq!(cues.context.owner(2), Some(101));
        assert_eq!(cues.context.owner(3), Some(101));
        assert_eq!(cues.context.owned_tracks(100), vec![1]);

        cues.panic_stop();
        assert_eq!(cues.context.owner(1), None);
        assert_eq!(cues.context.status(100), CueStatus::Idle);
        assert_eq!(cues.context.status(101), CueStatus::Idle);
    }

    #[test]
    fn missing_spec_surfaces_error() {
        let mut cues = test_engine();
        let mut project = test_project();
        let bad = Cue::new(
            200,
            "ghost",
            CueKind::Animation(AnimationCue {
                spec: 99,
                tracks: None,
                speed: None,
                loop_override: None,
                reverse: false,
            }),
        );
        assert!(matches!(
            cues.trigger_cue(&mut project, &bad),
            Err(EngineError::AnimationSpecNotFound(99))
        ));
    }

    #[test]
    fn unknown_tracks_ignored_cue_still_runs() {
        let mut cues = test_engine();
        let mut project = test_project();
        let cue = Cue::new(
            201,
            "partial",
            CueKind::Animation(AnimationCue {
                spec: 1,
                tracks: Some(vec![1, 77]),
                speed: None,
                loop_override: None,
                reverse: false,
            }),
        );
        cues.trigger_cue(&mut project, &cue).unwrap();
        assert_eq!(cues.context.owner(1), Some(201));
        assert_eq!(cues.context.owner(77), None);
    }

    #[test]
    fn stop_returns_to_rest_and_goes_idle() {
        let mut cues = test_engine();
        let mut project = test_project();

        cues.trigger(&mut project, 100).unwrap();
        thread::sleep(Duration::from_millis(200));
        cues.process_feedback(&mut project);
        // The circle displaced track 1 away from its rest position.
        let moved = project.tracks.get(1).unwrap().current_position;
        assert!(moved.distance(&Position::new(0.0, 0.0, 1.0)) > 1.0);

        cues.stop(100, false);
        // Default return-to-rest is 200ms; allow a few extra ticks.
        thread::sleep(Duration::from_millis(500));
        cues.process_feedback(&mut project);

        let rested = project.tracks.get(1).unwrap().current_position;
        assert!(rested.distance(&Position::new(0.0, 0.0, 1.0)) < 1e-3);
        assert_eq!(cues.context.status(100), CueStatus::Idle);
        assert_eq!(cues.context.owner(1), None);
    }

    #[test]
    fn finite_animation_autocompletes_and_releases() {
        let mut cues = test_engine();
        let mut project = test_project();
        let mut quick = AnimationSpec::new(5, "blip", "line")
            .with_param("start", ParamValue::Position(Position::ORIGIN))
            .with_param("end", ParamValue::Position(Position::new(1.0, 0.0, 0.0)));
        quick.duration = 0.1;
        quick.tracks = vec![1];
        project.animations.push(quick);
        let cue = Cue::new(
            202,
            "blip",
            CueKind::Animation(AnimationCue {
                spec: 5,
                tracks: None,
                speed: None,
                loop_override: None,
                reverse: false,
            }),
        );
        cues.trigger_cue(&mut project, &cue).unwrap();
        assert_eq!(cues.context.owner(1), Some(202));

        thread::sleep(Duration::from_millis(400));
        cues.process_feedback(&mut project);
        assert_eq!(cues.context.owner(1), None);
        assert_eq!(cues.context.status(202), CueStatus::Idle);
    }

    #[test]
    fn go_advances_and_triggers() {
        let mut cues = test_engine();
        let mut project = test_project();
        assert_eq!(cues.go(&mut project, 1).unwrap(), Some(100));
        assert_eq!(cues.context.owner(1), Some(100));
        assert_eq!(cues.go(&mut project, 1).unwrap(), Some(101));
        assert_eq!(cues.go(&mut project, 1).unwrap(), None);
    }
}
