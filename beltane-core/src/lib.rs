//! # beltane-core
//!
//! Engine library for the Beltane spatial-audio animator. Computes per-frame
//! 3D positions for device tracks from named motion models, dispatches them
//! over OSC/UDP, and coordinates concurrent animations through cues —
//! independent of any UI framework.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beltane_core::config::Config;
//! use beltane_core::cue::CueEngine;
//! use beltane_core::engine::EngineHandle;
//! use beltane_core::model::ModelRegistry;
//! use beltane_core::project::Project;
//! use beltane_core::wire::DeviceLink;
//!
//! // 1. Load config (embedded defaults + user override)
//! let config = Config::load();
//!
//! // 2. Connect the device link and take its control-message channel
//! let mut link = DeviceLink::connect(&config)?;
//! let control = link.take_control_rx();
//!
//! // 3. Spawn the tick thread; the link moves onto it
//! let registry = Arc::new(ModelRegistry::builtin());
//! let engine = EngineHandle::spawn(link, &config);
//!
//! // 4. Drive cues from the control thread
//! let mut project = Project::new(config.initial_preset_debounce_ms());
//! let mut cues = CueEngine::new(registry, engine, &config);
//! // ... per host loop iteration:
//! // cues.process_feedback(&mut project);
//! // cues.maintain(&mut project, std::time::Instant::now());
//! // project.presets.maintain(&project.tracks, std::time::Instant::now());
//! ```
//!
//! ## Module Overview
//!
//! - [`model`] — motion-model registry: ~20 built-in position producers
//!   (curves and state-carrying simulations) plus user registration
//! - [`engine`] — `EngineHandle` (control-thread interface) and the tick
//!   thread: scheduling, looping, return-to-rest, preset transitions
//! - [`wire`] — OSC device link: outbound diff/throttle/bounded dispatch,
//!   inbound listener, device mirror, connection health
//! - [`cue`] — cue executor with Last-Takes-Precedence track arbitration,
//!   cue lists, follow actions, transition planning
//! - [`preset`] — position preset library with the auto-maintained
//!   "Initial Positions" preset
//! - [`project`] — project JSON load/save, legacy field migration
//! - [`config`] — TOML configuration (embedded defaults + user override)

pub mod config;
pub mod cue;
pub mod engine;
pub mod error;
pub mod model;
pub mod preset;
pub mod project;
pub mod wire;

pub use error::EngineError;
