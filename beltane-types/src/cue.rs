use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{AnimationId, Position, PresetId, PresetTransition, TrackId};

/// Unique identifier for a cue.
pub type CueId = u32;

/// A wire message payload a cue can send verbatim (address + arguments).
/// Converted to OSC at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub address: String,
    pub args: Vec<WireArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireArg {
    Float(f32),
    Int(i32),
    Text(String),
    Bool(bool),
}

/// Starts an animation spec, optionally overriding its target set and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationCue {
    pub spec: AnimationId,
    #[serde(default)]
    pub tracks: Option<Vec<TrackId>>,
    /// Playback rate multiplier.
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub loop_override: Option<bool>,
    /// Run the model backwards in time.
    #[serde(default)]
    pub reverse: bool,
}

/// Fires a burst of raw wire messages and completes immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolCue {
    pub messages: Vec<WireMessage>,
}

/// Recalls a position preset through a timed transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetCue {
    pub preset: PresetId,
    pub transition: PresetTransition,
    /// Per-track target replacements applied on top of the preset.
    #[serde(default)]
    pub overrides: HashMap<TrackId, Position>,
    /// Stop animations currently owning the target tracks (immediate stop;
    /// the transition supplies its own easing).
    #[serde(default)]
    pub interrupt_animations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CueKind {
    Animation(AnimationCue),
    Protocol(ProtocolCue),
    Preset(PresetCue),
}

/// What happens when a cue finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowAction {
    None,
    /// Trigger the next cue in the list.
    Next,
    Goto(CueId),
}

impl Default for FollowAction {
    fn default() -> Self {
        Self::None
    }
}

/// Runtime status of a cue. Instantaneous cues go Idle → Running → Idle
/// within one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CueStatus {
    Idle,
    Armed,
    Running,
    /// Winding down (return-to-rest or tail of a transition).
    Completing,
}

impl Default for CueStatus {
    fn default() -> Self {
        Self::Idle
    }
}

/// A named, triggerable discrete action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cue {
    pub id: CueId,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Opaque trigger bindings forwarded from the host (hotkeys etc).
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Display color, opaque to the engine.
    #[serde(default)]
    pub color: Option<String>,
    pub kind: CueKind,
    #[serde(default)]
    pub follow: FollowAction,
    /// Seconds between completion and the follow action.
    #[serde(default)]
    pub follow_delay: f32,
}

fn default_enabled() -> bool {
    true
}

impl Cue {
    pub fn new(id: CueId, name: impl Into<String>, kind: CueKind) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            triggers: Vec::new(),
            color: None,
            kind,
            follow: FollowAction::None,
            follow_delay: 0.0,
        }
    }
}

/// Ordered collection of cues with GO/back navigation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CueList {
    pub id: u32,
    pub name: String,
    pub cues: Vec<Cue>,
    /// Index of the next cue GO will fire.
    #[serde(default)]
    pub playhead: usize,
}

impl CueList {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), cues: Vec::new(), playhead: 0 }
    }

    /// Next enabled cue at or after the playhead.
    pub fn current(&self) -> Option<&Cue> {
        self.cues.get(self.playhead..)?.iter().find(|c| c.enabled)
    }

    /// Advance the playhead past the current cue. Returns the cue to fire.
    pub fn go(&mut self) -> Option<CueId> {
        while self.playhead < self.cues.len() {
            let cue = &self.cues[self.playhead];
            self.playhead += 1;
            if cue.enabled {
                return Some(cue.id);
            }
        }
        None
    }

    /// Step the playhead back one cue (not past the start).
    pub fn back(&mut self) {
        self.playhead = self.playhead.saturating_sub(1);
    }

    pub fn goto(&mut self, index: usize) {
        self.playhead = index.min(self.cues.len());
    }

    pub fn position(&self, id: CueId) -> Option<usize> {
        self.cues.iter().position(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol_cue(id: CueId) -> Cue {
        Cue::new(id, format!("cue {id}"), CueKind::Protocol(ProtocolCue { messages: vec![] }))
    }

    #[test]
    fn go_skips_disabled() {
        let mut list = CueList::new(1, "main");
        list.cues.push(protocol_cue(10));
        let mut dead = protocol_cue(11);
        dead.enabled = false;
        list.cues.push(dead);
        list.cues.push(protocol_cue(12));

        assert_eq!(list.go(), Some(10));
        assert_eq!(list.go(), Some(12));
        assert_eq!(list.go(), None);
    }

    #[test]
    fn back_stops_at_start() {
        let mut list = CueList::new(1, "main");
        list.cues.push(protocol_cue(10));
        list.back();
        assert_eq!(list.playhead, 0);
        list.go();
        list.back();
        assert_eq!(list.playhead, 0);
    }
}
