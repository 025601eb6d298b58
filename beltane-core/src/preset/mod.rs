//! Position preset library: capture, recall, compare, import/export.
//!
//! One preset per project is auto-maintained: "Initial Positions" mirrors
//! every track's initial position, refreshed (debounced) as tracks are
//! added. It cannot be renamed or deleted.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use beltane_types::{
    PositionPreset, PresetId, PresetScope, TrackBank, TrackId, INITIAL_POSITIONS_NAME,
};
use beltane_types::Position;

use crate::error::EngineError;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetDelta {
    pub track: TrackId,
    pub delta: Position,
}

pub struct PresetStore {
    presets: Vec<PositionPreset>,
    next_id: PresetId,
    /// Armed when tracks were added; the auto preset refreshes when it fires.
    pending_refresh: Option<Instant>,
    debounce: Duration,
}

impl PresetStore {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            presets: Vec::new(),
            next_id: 1,
            pending_refresh: None,
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    /// Rebuild a store from loaded presets (project open).
    pub fn from_presets(presets: Vec<PositionPreset>, debounce_ms: u64) -> Self {
        let next_id = presets.iter().map(|p| p.id).max().map_or(1, |m| m + 1);
        Self {
            presets,
            next_id,
            pending_refresh: None,
            debounce: Duration::from_millis(debounce_ms),
        }
    }

    pub fn get(&self, id: PresetId) -> Option<&PositionPreset> {
        self.presets.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: PresetId) -> Option<&mut PositionPreset> {
        self.presets.iter_mut().find(|p| p.id == id)
    }

    pub fn all(&self) -> &[PositionPreset] {
        &self.presets
    }

    /// Snapshot the current position of each listed track. Unknown tracks
    /// are skipped with a warning.
    pub fn capture(
        &mut self,
        bank: &TrackBank,
        track_ids: &[TrackId],
        name: impl Into<String>,
        scope: PresetScope,
        category: Option<String>,
    ) -> Result<PresetId, EngineError> {
        let mut positions = HashMap::new();
        let mut captured = Vec::new();
        for track in track_ids {
            match bank.get(*track) {
                Some(t) => {
                    positions.insert(*track, t.current_position);
                    captured.push(*track);
                }
                None => {
                    log::warn!(target: "preset", "{}", EngineError::UnknownTrack(*track));
                }
            }
        }
        let id = self.next_id;
        self.next_id += 1;
        let now = unix_now();
        self.presets.push(PositionPreset {
            id,
            name: name.into(),
            scope,
            category,
            positions,
            track_ids: captured,
            tags: Vec::new(),
            favorite: false,
            created_at: now,
            updated_at: now,
            auto: false,
        });
        Ok(id)
    }

    pub fn rename(&mut self, id: PresetId, name: impl Into<String>) -> Result<(), EngineError> {
        let preset = self.get_mut(id).ok_or(EngineError::PresetNotFound(id))?;
        if preset.auto {
            return Err(EngineError::ProtectedPreset);
        }
        preset.name = name.into();
        preset.updated_at = unix_now();
        Ok(())
    }

    pub fn delete(&mut self, id: PresetId) -> Result<(), EngineError> {
        let preset = self.get(id).ok_or(EngineError::PresetNotFound(id))?;
        if preset.auto {
            return Err(EngineError::ProtectedPreset);
        }
        self.presets.retain(|p| p.id != id);
        Ok(())
    }

    /// Overwrite a preset's positions with the tracks' current positions.
    pub fn update_from(
        &mut self,
        id: PresetId,
        bank: &TrackBank,
    ) -> Result<(), EngineError> {
        let preset = self.get_mut(id).ok_or(EngineError::PresetNotFound(id))?;
        if preset.auto {
            return Err(EngineError::ProtectedPreset);
        }
        for track in preset.track_ids.clone() {
            if let Some(t) = bank.get(track) {
                preset.positions.insert(track, t.current_position);
            }
        }
        preset.updated_at = unix_now();
        Ok(())
    }

    /// Per-track deltas `b - a` over the union of both presets' tracks.
    pub fn compare(&self, a: PresetId, b: PresetId) -> Result<Vec<PresetDelta>, EngineError> {
        let pa = self.get(a).ok_or(EngineError::PresetNotFound(a))?;
        let pb = self.get(b).ok_or(EngineError::PresetNotFound(b))?;
        let mut tracks: Vec<TrackId> = pa.positions.keys().copied().collect();
        for track in pb.positions.keys() {
            if !tracks.contains(track) {
                tracks.push(*track);
            }
        }
        tracks.sort_unstable();
        Ok(tracks
            .into_iter()
            .map(|track| {
                let from = pa.positions.get(&track).copied().unwrap_or(Position::ORIGIN);
                let to = pb.positions.get(&track).copied().unwrap_or(Position::ORIGIN);
                PresetDelta { track, delta: to - from }
            })
            .collect())
    }

    pub fn export_one(&self, id: PresetId) -> Result<String, EngineError> {
        let preset = self.get(id).ok_or(EngineError::PresetNotFound(id))?;
        Ok(serde_json::to_string_pretty(preset)?)
    }

    /// Import a serialized preset under a fresh id. Imported presets are
    /// never auto, whatever the payload claims.
    pub fn import_one(&mut self, serialized: &str) -> Result<PresetId, EngineError> {
        let mut preset: PositionPreset = serde_json::from_str(serialized)?;
        preset.id = self.next_id;
        self.next_id += 1;
        preset.auto = false;
        preset.updated_at = unix_now();
        let id = preset.id;
        self.presets.push(preset);
        Ok(id)
    }

    /// Case-insensitive search over names and tags.
    pub fn search(&self, query: &str) -> Vec<&PositionPreset> {
        let needle = query.to_lowercase();
        self.presets
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn filter_category(&self, category: &str) -> Vec<&PositionPreset> {
        self.presets
            .iter()
            .filter(|p| p.category.as_deref() == Some(category))
            .collect()
    }

    pub fn filter_scope(&self, scope: PresetScope) -> Vec<&PositionPreset> {
        self.presets.iter().filter(|p| p.scope == scope).collect()
    }

    pub fn favorites(&self) -> Vec<&PositionPreset> {
        self.presets.iter().filter(|p| p.favorite).collect()
    }

    pub fn set_favorite(&mut self, id: PresetId, favorite: bool) -> Result<(), EngineError> {
        let preset = self.get_mut(id).ok_or(EngineError::PresetNotFound(id))?;
        preset.favorite = favorite;
        Ok(())
    }

    pub fn set_category(
        &mut self,
        id: PresetId,
        category: Option<String>,
    ) -> Result<(), EngineError> {
        let preset = self.get_mut(id).ok_or(EngineError::PresetNotFound(id))?;
        preset.category = category;
        preset.updated_at = unix_now();
        Ok(())
    }

    pub fn initial_preset(&self) -> Option<&PositionPreset> {
        self.presets.iter().find(|p| p.auto)
    }

    /// Create the auto preset once track ids are known. No-op if it exists.
    pub fn ensure_initial(&mut self, bank: &TrackBank) {
        if self.presets.iter().any(|p| p.auto) || bank.is_empty() {
            return;
        }
        let now = unix_now();
        let id = self.next_id;
        self.next_id += 1;
        let mut preset = PositionPreset {
            id,
            name: INITIAL_POSITIONS_NAME.to_string(),
            scope: PresetScope::Project,
            category: None,
            positions: HashMap::new(),
            track_ids: Vec::new(),
            tags: Vec::new(),
            favorite: false,
            created_at: now,
            updated_at: now,
            auto: true,
        };
        fill_initial(&mut preset, bank);
        self.presets.push(preset);
        log::debug!(target: "preset", "created initial-positions preset");
    }

    /// Tracks were added: arm (or re-arm) the debounced refresh.
    pub fn note_tracks_added(&mut self, now: Instant) {
        self.pending_refresh = Some(now + self.debounce);
    }

    /// Run pending maintenance. Creates the auto preset on first call with
    /// known tracks; refreshes it when the debounce window closes.
    pub fn maintain(&mut self, bank: &TrackBank, now: Instant) {
        self.ensure_initial(bank);
        let due = matches!(self.pending_refresh, Some(at) if at <= now);
        if !due {
            return;
        }
        self.pending_refresh = None;
        if let Some(preset) = self.presets.iter_mut().find(|p| p.auto) {
            fill_initial(preset, bank);
            preset.updated_at = unix_now();
            log::debug!(target: "preset", "refreshed initial-positions preset ({} tracks)", preset.track_ids.len());
        }
    }
}

fn fill_initial(preset: &mut PositionPreset, bank: &TrackBank) {
    preset.positions.clear();
    preset.track_ids.clear();
    for track in &bank.tracks {
        preset.positions.insert(track.id, track.rest_position());
        preset.track_ids.push(track.id);
    }
}
