use std::path::PathBuf;

use serde::Deserialize;

use beltane_types::Easing;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    net: NetConfig,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    cue: CueConfig,
}

#[derive(Deserialize, Default)]
struct NetConfig {
    listen_port: Option<u16>,
    device_host: Option<String>,
    device_port: Option<u16>,
    send_buffer_bytes: Option<usize>,
}

#[derive(Deserialize, Default)]
struct EngineConfig {
    tick_hz: Option<u32>,
    return_ms: Option<u64>,
    return_easing: Option<String>,
}

#[derive(Deserialize, Default)]
struct DispatchConfig {
    per_track_min_interval_ms: Option<u64>,
    max_in_flight_per_device: Option<usize>,
    epsilon: Option<f32>,
    overflow_warn_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct CueConfig {
    priority_mode: Option<String>,
    query_timeout_ms: Option<u64>,
    initial_preset_debounce_ms: Option<u64>,
}

/// Conflict resolution between concurrent cues. Only LTP is implemented;
/// other modes named in config fall back to LTP with a logged warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityMode {
    Ltp,
}

pub struct Config {
    net: NetConfig,
    engine: EngineConfig,
    dispatch: DispatchConfig,
    cue: CueConfig,
}

impl Config {
    pub fn load() -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            net: base.net,
            engine: base.engine,
            dispatch: base.dispatch,
            cue: base.cue,
        }
    }

    /// UDP port the inbound listener binds.
    pub fn listen_port(&self) -> u16 {
        self.net.listen_port.unwrap_or(9000)
    }

    pub fn device_host(&self) -> &str {
        self.net.device_host.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn device_port(&self) -> u16 {
        self.net.device_port.unwrap_or(12000)
    }

    pub fn send_buffer_bytes(&self) -> usize {
        self.net.send_buffer_bytes.unwrap_or(262_144)
    }

    /// Logical tick rate (clamped to 1..=240).
    pub fn tick_hz(&self) -> u32 {
        self.engine.tick_hz.unwrap_or(30).clamp(1, 240)
    }

    /// Return-to-rest duration after a stop, in milliseconds.
    pub fn return_ms(&self) -> u64 {
        self.engine.return_ms.unwrap_or(200)
    }

    pub fn return_easing(&self) -> Easing {
        self.engine
            .return_easing
            .as_deref()
            .and_then(Easing::from_name)
            .unwrap_or(Easing::QuadOut)
    }

    /// Minimum inter-send interval per track, in milliseconds.
    pub fn per_track_min_interval_ms(&self) -> u64 {
        self.dispatch.per_track_min_interval_ms.unwrap_or(20)
    }

    pub fn max_in_flight_per_device(&self) -> usize {
        self.dispatch.max_in_flight_per_device.unwrap_or(100).max(1)
    }

    /// Diff threshold below which a re-proposed position is not re-sent.
    pub fn epsilon(&self) -> f32 {
        self.dispatch.epsilon.unwrap_or(1e-4).max(0.0)
    }

    pub fn overflow_warn_secs(&self) -> u64 {
        self.dispatch.overflow_warn_secs.unwrap_or(5).max(1)
    }

    pub fn priority_mode(&self) -> PriorityMode {
        match self.cue.priority_mode.as_deref() {
            None | Some("ltp") | Some("LTP") => PriorityMode::Ltp,
            Some(other) => {
                log::warn!(target: "config", "priority mode '{}' not implemented, using LTP", other);
                PriorityMode::Ltp
            }
        }
    }

    /// Window without inbound traffic after which the device is unhealthy.
    pub fn query_timeout_ms(&self) -> u64 {
        self.cue.query_timeout_ms.unwrap_or(2000)
    }

    /// Debounce for refreshing the initial-positions preset after track adds.
    pub fn initial_preset_debounce_ms(&self) -> u64 {
        self.cue.initial_preset_debounce_ms.unwrap_or(500)
    }
}

impl Default for Config {
    fn default() -> Self {
        let base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");
        Config {
            net: base.net,
            engine: base.engine,
            dispatch: base.dispatch,
            cue: base.cue,
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beltane").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.net.listen_port.is_some() {
        base.net.listen_port = user.net.listen_port;
    }
    if user.net.device_host.is_some() {
        base.net.device_host = user.net.device_host;
    }
    if user.net.device_port.is_some() {
        base.net.device_port = user.net.device_port;
    }
    if user.net.send_buffer_bytes.is_some() {
        base.net.send_buffer_bytes = user.net.send_buffer_bytes;
    }
    if user.engine.tick_hz.is_some() {
        base.engine.tick_hz = user.engine.tick_hz;
    }
    if user.engine.return_ms.is_some() {
        base.engine.return_ms = user.engine.return_ms;
    }
    if user.engine.return_easing.is_some() {
        base.engine.return_easing = user.engine.return_easing;
    }
    if user.dispatch.per_track_min_interval_ms.is_some() {
        base.dispatch.per_track_min_interval_ms = user.dispatch.per_track_min_interval_ms;
    }
    if user.dispatch.max_in_flight_per_device.is_some() {
        base.dispatch.max_in_flight_per_device = user.dispatch.max_in_flight_per_device;
    }
    if user.dispatch.epsilon.is_some() {
        base.dispatch.epsilon = user.dispatch.epsilon;
    }
    if user.dispatch.overflow_warn_secs.is_some() {
        base.dispatch.overflow_warn_secs = user.dispatch.overflow_warn_secs;
    }
    if user.cue.priority_mode.is_some() {
        base.cue.priority_mode = user.cue.priority_mode;
    }
    if user.cue.query_timeout_ms.is_some() {
        base.cue.query_timeout_ms = user.cue.query_timeout_ms;
    }
    if user.cue.initial_preset_debounce_ms.is_some() {
        base.cue.initial_preset_debounce_ms = user.cue.initial_preset_debounce_ms;
    }
}
