use serde::{Deserialize, Serialize};

use crate::{Position, TrackId};

/// An addressable audio object on the device.
///
/// `initial_position` is written once, the first time the track is seen, and
/// only changes again on an explicit re-baseline. Animations and preset
/// transitions are the only writers of `current_position`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// Display color, opaque to the engine (forwarded as `/track/{id}/color`).
    pub color: Option<String>,
    pub current_position: Position,
    pub initial_position: Option<Position>,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: None,
            current_position: Position::ORIGIN,
            initial_position: None,
        }
    }

    /// Record the initial position if it has not been captured yet.
    pub fn mark_initial(&mut self) {
        if self.initial_position.is_none() {
            self.initial_position = Some(self.current_position);
        }
    }

    /// Overwrite the baseline with the current position (operator action).
    pub fn rebaseline(&mut self) {
        self.initial_position = Some(self.current_position);
    }

    /// The rest position animations return to: the baseline if captured,
    /// otherwise the current position.
    pub fn rest_position(&self) -> Position {
        self.initial_position.unwrap_or(self.current_position)
    }
}

/// Ordered collection of tracks, keyed lookup by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackBank {
    pub tracks: Vec<Track>,
}

impl TrackBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track. Its initial position is captured immediately.
    pub fn add(&mut self, mut track: Track) -> TrackId {
        track.mark_initial();
        let id = track.id;
        self.tracks.push(track);
        id
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
