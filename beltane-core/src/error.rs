use beltane_types::{AnimationId, PresetId, TrackId};

/// Control-plane error type. Tick-loop errors never surface through this;
/// they degrade to local skips and log lines.
#[derive(Debug)]
pub enum EngineError {
    /// No motion model registered under this id.
    UnknownModel(String),
    /// Required parameters missing or mistyped, detected at start.
    InvalidParameters { model: String, detail: String },
    /// Target track not in the project; the cue runs on the remaining tracks.
    UnknownTrack(TrackId),
    PresetNotFound(PresetId),
    AnimationSpecNotFound(AnimationId),
    /// The auto-maintained "Initial Positions" preset cannot be renamed or
    /// deleted.
    ProtectedPreset,
    /// The device link is down; the message was dropped and stats updated.
    TransportUnavailable,
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownModel(id) => write!(f, "unknown motion model '{}'", id),
            Self::InvalidParameters { model, detail } => {
                write!(f, "invalid parameters for model '{}': {}", model, detail)
            }
            Self::UnknownTrack(id) => write!(f, "unknown track {}", id),
            Self::PresetNotFound(id) => write!(f, "preset {} not found", id),
            Self::AnimationSpecNotFound(id) => write!(f, "animation spec {} not found", id),
            Self::ProtectedPreset => write!(f, "the initial-positions preset is protected"),
            Self::TransportUnavailable => write!(f, "device link unavailable"),
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}
