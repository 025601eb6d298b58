//! Device link: outbound dispatch, inbound listener, connection health.
//!
//! One [`DeviceLink`] per device endpoint. Outbound traffic flows through
//! [`WireDispatch`]; a listener thread decodes inbound OSC, mirrors
//! device-side values, answers `/get` queries, and forwards control
//! messages (`/cue/...`, `/animation/...`) to the control thread.

pub mod dispatch;
pub mod protocol;

pub use dispatch::{DispatchSettings, LinkStats, LinkStatsSnapshot, WireDispatch};
pub use protocol::{Axis, Inbound};

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use beltane_types::{Position, TrackId};
use rosc::{OscMessage, OscPacket};

use crate::config::Config;

/// Endpoint lifecycle. Stop re-enters `Connected` through a buffer reset;
/// it never tears the link down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Default)]
struct MirrorInner {
    positions: HashMap<TrackId, Position>,
    gains: HashMap<TrackId, f32>,
    mutes: HashMap<TrackId, bool>,
    colors: HashMap<TrackId, String>,
    last_inbound: Option<Instant>,
}

/// Device-side values as last reported by the device. Shared between the
/// listener thread (writer) and the control/tick threads (readers).
#[derive(Clone, Default)]
pub struct DeviceMirror {
    inner: Arc<RwLock<MirrorInner>>,
}

impl DeviceMirror {
    pub fn position(&self, track: TrackId) -> Option<Position> {
        self.inner.read().ok()?.positions.get(&track).copied()
    }

    pub fn gain(&self, track: TrackId) -> Option<f32> {
        self.inner.read().ok()?.gains.get(&track).copied()
    }

    pub fn mute(&self, track: TrackId) -> Option<bool> {
        self.inner.read().ok()?.mutes.get(&track).copied()
    }

    pub fn color(&self, track: TrackId) -> Option<String> {
        self.inner.read().ok()?.colors.get(&track).cloned()
    }

    pub fn last_inbound(&self) -> Option<Instant> {
        self.inner.read().ok()?.last_inbound
    }

    fn apply(&self, inbound: &Inbound, now: Instant) {
        let Ok(mut inner) = self.inner.write() else { return };
        inner.last_inbound = Some(now);
        match inbound {
            Inbound::TrackXyz { track, pos } => {
                inner.positions.insert(*track, *pos);
            }
            Inbound::TrackAed { track, azim, elev, dist } => {
                inner
                    .positions
                    .insert(*track, Position::from_aed(*azim, *elev, *dist));
            }
            Inbound::TrackAxis { track, axis, value } => {
                let entry = inner.positions.entry(*track).or_default();
                match axis {
                    Axis::X => entry.x = *value,
                    Axis::Y => entry.y = *value,
                    Axis::Z => entry.z = *value,
                }
            }
            Inbound::TrackAxisDelta { track, axis, delta } => {
                let entry = inner.positions.entry(*track).or_default();
                match axis {
                    Axis::X => entry.x += *delta,
                    Axis::Y => entry.y += *delta,
                    Axis::Z => entry.z += *delta,
                }
            }
            Inbound::TrackAzim { track, value } => {
                let entry = inner.positions.entry(*track).or_default();
                let (_, e, d) = entry.to_aed();
                *entry = Position::from_aed(*value, e, d);
            }
            Inbound::TrackElev { track, value } => {
                let entry = inner.positions.entry(*track).or_default();
                let (a, _, d) = entry.to_aed();
                *entry = Position::from_aed(a, *value, d);
            }
            Inbound::TrackDist { track, value } => {
                let entry = inner.positions.entry(*track).or_default();
                let (a, e, _) = entry.to_aed();
                *entry = Position::from_aed(a, e, *value);
            }
            Inbound::TrackGain { track, value } => {
                inner.gains.insert(*track, *value);
            }
            Inbound::TrackMute { track, mute } => {
                inner.mutes.insert(*track, *mute);
            }
            Inbound::TrackColor { track, color } => {
                inner.colors.insert(*track, color.clone());
            }
            _ => {}
        }
    }

    /// Answer a `/get "<path>"` query from mirrored state.
    fn answer(&self, path: &str) -> Option<OscMessage> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match parts.as_slice() {
            ["track", id, "xyz"] => {
                let track: TrackId = id.parse().ok()?;
                Some(protocol::track_xyz(track, self.position(track)?))
            }
            ["track", id, "aed"] => {
                let track: TrackId = id.parse().ok()?;
                Some(protocol::track_aed(track, self.position(track)?))
            }
            ["track", id, "gain", "value"] => {
                let track: TrackId = id.parse().ok()?;
                Some(protocol::track_gain(track, self.gain(track)?))
            }
            ["track", id, "mute"] => {
                let track: TrackId = id.parse().ok()?;
                Some(protocol::track_mute(track, self.mute(track)?))
            }
            _ => None,
        }
    }
}

pub struct DeviceLink {
    dispatch: WireDispatch,
    state: LinkState,
    mirror: DeviceMirror,
    /// Taken by the control thread before the link moves to the tick thread.
    control_rx: Option<Receiver<Inbound>>,
    query_timeout: Duration,
    shutdown: Arc<AtomicBool>,
    listen_thread: Option<JoinHandle<()>>,
}

impl DeviceLink {
    /// Bind the listener, spawn the sender, move to `Connected`.
    pub fn connect(config: &Config) -> std::io::Result<Self> {
        use std::net::ToSocketAddrs;
        let device: SocketAddr = (config.device_host(), config.device_port())
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "device host did not resolve")
            })?;
        let settings = DispatchSettings {
            epsilon: config.epsilon(),
            min_interval: Duration::from_millis(config.per_track_min_interval_ms()),
            max_in_flight: config.max_in_flight_per_device(),
            overflow_warn: Duration::from_secs(config.overflow_warn_secs()),
            send_buffer_bytes: config.send_buffer_bytes(),
        };
        Self::connect_to(device, config.listen_port(), settings, config.query_timeout_ms())
    }

    pub fn connect_to(
        device: SocketAddr,
        listen_port: u16,
        settings: DispatchSettings,
        query_timeout_ms: u64,
    ) -> std::io::Result<Self> {
        log::info!(target: "wire", "connecting to device {} (listen port {})", device, listen_port);
        let dispatch = WireDispatch::new(device, settings)?;
        let mirror = DeviceMirror::default();
        let (control_tx, control_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));

        let listen_socket = UdpSocket::bind(("0.0.0.0", listen_port))?;
        listen_socket.set_read_timeout(Some(Duration::from_millis(50)))?;
        let thread_mirror = mirror.clone();
        let thread_shutdown = Arc::clone(&shutdown);
        let listen_thread = thread::Builder::new()
            .name("wire-listener".into())
            .spawn(move || listen_loop(listen_socket, thread_mirror, control_tx, thread_shutdown))
            .expect("failed to spawn wire-listener thread");

        Ok(Self {
            dispatch,
            state: LinkState::Connected,
            mirror,
            control_rx: Some(control_rx),
            query_timeout: Duration::from_millis(query_timeout_ms),
            shutdown,
            listen_thread: Some(listen_thread),
        })
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Healthy while inbound traffic has been seen within the query window.
    pub fn healthy(&self, now: Instant) -> bool {
        match self.mirror.last_inbound() {
            Some(at) => now.duration_since(at) <= self.query_timeout,
            None => false,
        }
    }

    /// Shared view of device-side values; clone and keep it anywhere.
    pub fn mirror(&self) -> DeviceMirror {
        self.mirror.clone()
    }

    pub fn dispatch(&mut self) -> &mut WireDispatch {
        &mut self.dispatch
    }

    /// Extract the control-message receiver. Call once, before handing the
    /// link to the engine; the receiver stays on the control thread.
    pub fn take_control_rx(&mut self) -> Option<Receiver<Inbound>> {
        self.control_rx.take()
    }

    /// Periodic health probe: query a device path; any reply refreshes
    /// `last_inbound`.
    pub fn send_health_query(&mut self, path: &str, now: Instant) {
        self.dispatch.send_message(protocol::get_query(path), now);
    }

    /// Stop procedure: discard queued and OS-buffered output. The link
    /// stays `Connected`.
    pub fn reset_buffers(&mut self) {
        self.dispatch.reset();
        log::debug!(target: "wire", "transport buffers reset");
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.listen_thread.take() {
            let _ = handle.join();
        }
        self.state = LinkState::Disconnected;
    }
}

fn listen_loop(
    socket: UdpSocket,
    mirror: DeviceMirror,
    control_tx: Sender<Inbound>,
    shutdown: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 4096];
    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                let Ok((_, packet)) = rosc::decoder::decode_udp(&buf[..n]) else {
                    continue;
                };
                let mut decoded = Vec::new();
                protocol::decode_packet(&packet, &mut decoded);
                for inbound in decoded {
                    match &inbound {
                        Inbound::CueGo { .. }
                        | Inbound::AnimationPlay { .. }
                        | Inbound::AnimationPause { .. }
                        | Inbound::AnimationStop { .. }
                        | Inbound::AnimationLoop { .. }
                        | Inbound::AnimationSpeed { .. }
                        | Inbound::AnimationTime { .. } => {
                            if control_tx.send(inbound).is_err() {
                                return;
                            }
                        }
                        Inbound::Get { path } => {
                            if let Some(reply) = mirror.answer(path) {
                                if let Ok(encoded) =
                                    rosc::encoder::encode(&OscPacket::Message(reply))
                                {
                                    let _ = socket.send_to(&encoded, from);
                                }
                            }
                        }
                        _ => mirror.apply(&inbound, Instant::now()),
                    }
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_applies_axis_and_delta() {
        let mirror = DeviceMirror::default();
        let now = Instant::now();
        mirror.apply(
            &Inbound::TrackXyz { track: 1, pos: Position::new(1.0, 2.0, 3.0) },
            now,
        );
        mirror.apply(&Inbound::TrackAxis { track: 1, axis: Axis::Y, value: 5.0 }, now);
        mirror.apply(
            &Inbound::TrackAxisDelta { track: 1, axis: Axis::X, delta: -0.5 },
            now,
        );
        assert_eq!(mirror.position(1), Some(Position::new(0.5, 5.0, 3.0)));
    }

    #[test]
    fn mirror_answers_get() {
        let mirror = DeviceMirror::default();
        mirror.apply(
            &Inbound::TrackXyz { track: 4, pos: Position::new(1.0, 0.0, 0.0) },
            Instant::now(),
        );
        let reply = mirror.answer("/track/4/xyz").unwrap();
        assert_eq!(reply.addr, "/track/4/xyz");
        assert!(mirror.answer("/track/9/xyz").is_none());
        assert!(mirror.answer("/nonsense").is_none());
    }

    #[test]
    fn unhealthy_without_inbound() {
        let mirror = DeviceMirror::default();
        assert!(mirror.last_inbound().is_none());
    }
}
