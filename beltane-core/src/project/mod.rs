//! Project state and the load/save contract with the host UI.
//!
//! The project file is a single JSON document: tracks, animation specs, cue
//! lists, and the project-scoped preset library. Loading folds legacy
//! per-mode fields (`multiTrackMode`, `phaseOffsetSeconds`, `customCenter`,
//! `trackOffsets`) into the unified animation transform; saving never emits
//! them again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use beltane_types::{
    AnimationId, AnimationSpec, Cue, CueId, CueList, PositionPreset, PresetScope, Position,
    Track, TrackBank, TrackId, TrackTransform,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::preset::PresetStore;

const PROJECT_VERSION: u32 = 2;

pub struct Project {
    pub tracks: TrackBank,
    pub animations: Vec<AnimationSpec>,
    pub cue_lists: Vec<CueList>,
    pub presets: PresetStore,
}

impl Project {
    pub fn new(preset_debounce_ms: u64) -> Self {
        Self {
            tracks: TrackBank::new(),
            animations: Vec::new(),
            cue_lists: Vec::new(),
            presets: PresetStore::new(preset_debounce_ms),
        }
    }

    pub fn find_animation(&self, id: AnimationId) -> Option<&AnimationSpec> {
        self.animations.iter().find(|a| a.id == id)
    }

    pub fn find_cue(&self, id: CueId) -> Option<&Cue> {
        self.cue_lists
            .iter()
            .flat_map(|list| list.cues.iter())
            .find(|c| c.id == id)
    }

    /// Next enabled cue after `id` within its own list.
    pub fn next_cue_after(&self, id: CueId) -> Option<CueId> {
        for list in &self.cue_lists {
            if let Some(pos) = list.position(id) {
                return list.cues[pos + 1..].iter().find(|c| c.enabled).map(|c| c.id);
            }
        }
        None
    }

    /// Add a track, capturing its initial position and arming the preset
    /// refresh.
    pub fn add_track(&mut self, track: Track, now: std::time::Instant) -> TrackId {
        let id = self.tracks.add(track);
        self.presets.note_tracks_added(now);
        id
    }
}

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    #[serde(default)]
    tracks: Vec<Track>,
    /// Raw values so legacy animation shapes can be migrated on read.
    #[serde(default)]
    animations: Vec<Value>,
    #[serde(default)]
    cue_lists: Vec<CueList>,
    #[serde(default)]
    presets: Vec<PositionPreset>,
}

pub fn save_project(path: &Path, project: &Project) -> Result<(), EngineError> {
    let file = ProjectFile {
        version: PROJECT_VERSION,
        tracks: project.tracks.tracks.clone(),
        animations: project
            .animations
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?,
        cue_lists: project.cue_lists.clone(),
        presets: project
            .presets
            .all()
            .iter()
            .filter(|p| p.scope == PresetScope::Project)
            .cloned()
            .collect(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)?;
    log::info!(target: "project", "saved project to {}", path.display());
    Ok(())
}

pub fn load_project(path: &Path, preset_debounce_ms: u64) -> Result<Project, EngineError> {
    let contents = std::fs::read_to_string(path)?;
    let file: ProjectFile = serde_json::from_str(&contents)?;
    let mut animations = Vec::with_capacity(file.animations.len());
    for value in file.animations {
        match decode_animation(value) {
            Ok(spec) => animations.push(spec),
            Err(e) => {
                log::warn!(target: "project", "skipping unreadable animation: {}", e)
            }
        }
    }
    let mut tracks = TrackBank::new();
    for track in file.tracks {
        tracks.add(track);
    }
    log::info!(
        target: "project",
        "loaded project from {} ({} tracks, {} animations)",
        path.display(),
        tracks.len(),
        animations.len()
    );
    Ok(Project {
        tracks,
        animations,
        cue_lists: file.cue_lists,
        presets: PresetStore::from_presets(file.presets, preset_debounce_ms),
    })
}

/// Decode one animation value, folding legacy fields in first.
fn decode_animation(mut value: Value) -> Result<AnimationSpec, EngineError> {
    if let Some(object) = value.as_object_mut() {
        migrate_legacy_fields(object);
    }
    Ok(serde_json::from_value(value)?)
}

/// Older projects carried scattered per-mode fields instead of a unified
/// transform. Fold them in and drop them; they are never written back.
fn migrate_legacy_fields(object: &mut serde_json::Map<String, Value>) {
    let legacy_mode = object.remove("multiTrackMode");
    let legacy_phase = object.remove("phaseOffsetSeconds");
    let legacy_center = object.remove("customCenter");
    let legacy_offsets = object.remove("trackOffsets");
    if legacy_mode.is_none()
        && legacy_phase.is_none()
        && legacy_center.is_none()
        && legacy_offsets.is_none()
    {
        return;
    }

    let track_order: Vec<TrackId> = object
        .get("tracks")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_u64().map(|n| n as TrackId)).collect())
        .unwrap_or_default();

    let mut transforms: HashMap<TrackId, TrackTransform> = HashMap::new();

    // Incremental phase shift: track i starts i * offset seconds late.
    if let Some(seconds) = legacy_phase.as_ref().and_then(Value::as_f64) {
        for (index, track) in track_order.iter().enumerate() {
            transforms.entry(*track).or_default().time_shift = index as f32 * seconds as f32;
        }
    } else if let Some(map) = legacy_phase.as_ref().and_then(Value::as_object) {
        for (key, shift) in map {
            let (Ok(track), Some(shift)) = (key.parse::<TrackId>(), shift.as_f64()) else {
                continue;
            };
            transforms.entry(track).or_default().time_shift = shift as f32;
        }
    }

    if let Some(map) = legacy_offsets.as_ref().and_then(Value::as_object) {
        for (key, offset) in map {
            let (Ok(track), Some(pos)) = (key.parse::<TrackId>(), position_from(offset)) else {
                continue;
            };
            transforms.entry(track).or_default().offset = pos;
        }
    }

    let anchor = legacy_center.as_ref().and_then(position_from).unwrap_or(Position::ORIGIN);
    let mode = legacy_mode.as_ref().and_then(Value::as_str).unwrap_or("absolute");
    let transform = match mode {
        "relative" => serde_json::json!({ "Relative": null }),
        "formation" | "formation_rigid" => serde_json::json!({
            "Formation": { "anchor": anchor, "pattern": "Rigid" }
        }),
        "formation_spherical" => serde_json::json!({
            "Formation": { "anchor": anchor, "pattern": "Spherical" }
        }),
        _ => serde_json::json!("Absolute"),
    };
    object.insert("transform".to_string(), normalize_unit_variant(transform));

    if !transforms.is_empty() {
        if let Ok(value) = serde_json::to_value(&transforms) {
            object.insert("track_transforms".to_string(), value);
        }
    }
}

/// `{"Relative": null}` is not how serde encodes a unit variant; collapse it.
fn normalize_unit_variant(value: Value) -> Value {
    match &value {
        Value::Object(map) if map.len() == 1 => {
            if let Some((key, Value::Null)) = map.iter().next() {
                return Value::String(key.clone());
            }
            value
        }
        _ => value,
    }
}

fn position_from(value: &Value) -> Option<Position> {
    if let Some(arr) = value.as_array() {
        if arr.len() == 3 {
            return Some(Position::new(
                arr[0].as_f64()? as f32,
                arr[1].as_f64()? as f32,
                arr[2].as_f64()? as f32,
            ));
        }
        return None;
    }
    let object = value.as_object()?;
    Some(Position::new(
        object.get("x")?.as_f64()? as f32,
        object.get("y")?.as_f64()? as f32,
        object.get("z")?.as_f64()? as f32,
    ))
}

/// Global presets live in the user profile, not the project file.
pub fn global_presets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beltane").join("presets.json"))
}

pub fn load_global_presets(path: &Path) -> Result<Vec<PositionPreset>, EngineError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_global_presets(path: &Path, presets: &[PositionPreset]) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let global: Vec<&PositionPreset> =
        presets.iter().filter(|p| p.scope == PresetScope::Global).collect();
    std::fs::write(path, serde_json::to_string_pretty(&global)?)?;
    Ok(())
}

#[cfg(test)]
mod tests;
