//! Fire-and-forget UDP dispatch with per-track diffing and throttling.
//!
//! The tick loop proposes positions; this layer keeps a shadow of the last
//! value sent per track, drops unchanged proposals, enforces a minimum
//! inter-send interval, and pushes encoded packets onto a bounded channel
//! drained by a dedicated sender thread. The tick loop never touches the
//! socket and never blocks.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use beltane_types::{Position, TrackId};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rosc::{OscMessage, OscPacket};

use super::protocol;

/// Tuning knobs, filled from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Proposals within this distance of the last sent value are dropped.
    pub epsilon: f32,
    /// Minimum interval between sends for one track.
    pub min_interval: Duration,
    /// Bounded queue capacity toward the sender thread.
    pub max_in_flight: usize,
    /// Overflow warnings are emitted at most this often.
    pub overflow_warn: Duration,
    /// Requested OS send-buffer size.
    pub send_buffer_bytes: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            min_interval: Duration::from_millis(20),
            max_in_flight: 100,
            overflow_warn: Duration::from_secs(5),
            send_buffer_bytes: 262_144,
        }
    }
}

/// Connection statistics, shared between the dispatch layer and its sender
/// thread. All counters are cumulative since link creation.
#[derive(Debug, Default)]
pub struct LinkStats {
    pub sent: AtomicU64,
    /// Dropped because the bounded queue was full.
    pub dropped_full: AtomicU64,
    /// Dropped by the epsilon diff.
    pub dropped_unchanged: AtomicU64,
    /// Discarded because a buffer reset superseded them.
    pub dropped_stale: AtomicU64,
    pub send_errors: AtomicU64,
}

impl LinkStats {
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_unchanged: self.dropped_unchanged.load(Ordering::Relaxed),
            dropped_stale: self.dropped_stale.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    pub sent: u64,
    pub dropped_full: u64,
    pub dropped_unchanged: u64,
    pub dropped_stale: u64,
    pub send_errors: u64,
}

enum SendEntry {
    Packet { generation: u64, buf: Vec<u8> },
    /// Recreate the socket, discarding OS-buffered datagrams.
    Rebind,
}

#[derive(Debug, Default)]
struct TrackShadow {
    last_sent: Option<Position>,
    last_sent_at: Option<Instant>,
    pending: Option<Position>,
}

pub struct WireDispatch {
    /// Dropped on shutdown so the sender thread's `recv` unblocks.
    tx: Option<Sender<SendEntry>>,
    /// Bumped on reset; the sender thread skips packets from older generations.
    generation: Arc<AtomicU64>,
    shadows: HashMap<TrackId, TrackShadow>,
    stats: Arc<LinkStats>,
    settings: DispatchSettings,
    last_overflow_warn: Option<Instant>,
    sender_thread: Option<JoinHandle<()>>,
}

impl WireDispatch {
    pub fn new(device: SocketAddr, settings: DispatchSettings) -> std::io::Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded::<SendEntry>(settings.max_in_flight);
        let generation = Arc::new(AtomicU64::new(0));
        let stats = Arc::new(LinkStats::default());

        let thread_gen = Arc::clone(&generation);
        let thread_stats = Arc::clone(&stats);
        let buffer_bytes = settings.send_buffer_bytes;
        let handle = thread::Builder::new()
            .name("wire-sender".into())
            .spawn(move || sender_loop(device, rx, thread_gen, thread_stats, buffer_bytes))
            .expect("failed to spawn wire-sender thread");

        Ok(Self {
            tx: Some(tx),
            generation,
            shadows: HashMap::new(),
            stats,
            settings,
            last_overflow_warn: None,
            sender_thread: Some(handle),
        })
    }

    /// Propose a position for this tick. Replaces any pending proposal for
    /// the track; nothing is transmitted until [`flush`](Self::flush).
    pub fn propose(&mut self, track: TrackId, pos: Position) {
        self.shadows.entry(track).or_default().pending = Some(pos);
    }

    /// Flush due proposals: unchanged ones are dropped, throttled ones stay
    /// pending for a later flush, the rest are encoded and queued.
    pub fn flush(&mut self, now: Instant) {
        let epsilon = self.settings.epsilon;
        let min_interval = self.settings.min_interval;
        let mut due: Vec<(TrackId, Position)> = Vec::new();

        for (track, shadow) in self.shadows.iter_mut() {
            let Some(pos) = shadow.pending else { continue };
            if let Some(last) = shadow.last_sent {
                if last.distance(&pos) <= epsilon {
                    shadow.pending = None;
                    self.stats.dropped_unchanged.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            }
            if let Some(at) = shadow.last_sent_at {
                if now.duration_since(at) < min_interval {
                    // Throttled; the pending value waits (and may be
                    // replaced by a newer proposal before it becomes due).
                    continue;
                }
            }
            shadow.pending = None;
            shadow.last_sent = Some(pos);
            shadow.last_sent_at = Some(now);
            due.push((*track, pos));
        }

        for (track, pos) in due {
            self.enqueue_message(protocol::track_xyz(track, pos), now);
        }
    }

    /// Queue a raw message (protocol cues, color/gain/mute, queries).
    /// Bypasses the per-track diff but shares the bounded queue.
    pub fn send_message(&mut self, msg: OscMessage, now: Instant) {
        self.enqueue_message(msg, now);
    }

    fn enqueue_message(&mut self, msg: OscMessage, now: Instant) {
        let buf = match rosc::encoder::encode(&OscPacket::Message(msg)) {
            Ok(buf) => buf,
            Err(e) => {
                log::warn!(target: "wire::dispatch", "failed to encode message: {}", e);
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        let entry = SendEntry::Packet {
            generation: self.generation.load(Ordering::Relaxed),
            buf,
        };
        let Some(tx) = self.tx.as_ref() else { return };
        match tx.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.dropped_full.fetch_add(1, Ordering::Relaxed);
                let warn_due = self
                    .last_overflow_warn
                    .map(|at| now.duration_since(at) >= self.settings.overflow_warn)
                    .unwrap_or(true);
                if warn_due {
                    self.last_overflow_warn = Some(now);
                    log::warn!(
                        target: "wire::dispatch",
                        "outbound queue full, dropping messages ({} dropped so far)",
                        self.stats.dropped_full.load(Ordering::Relaxed)
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                self.stats.send_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Buffer reset: discard every queued packet and recreate the socket so
    /// OS-buffered datagrams are dropped too. Called when all animations
    /// stop; without it the device keeps moving after the operator's stop.
    pub fn reset(&mut self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
        for shadow in self.shadows.values_mut() {
            shadow.pending = None;
            shadow.last_sent_at = None;
        }
        // The rebind entry must get through even when the queue is full of
        // now-stale packets; retry after yielding to the draining thread.
        let Some(tx) = self.tx.as_ref() else { return };
        for _ in 0..64 {
            match tx.try_send(SendEntry::Rebind) {
                Ok(()) => return,
                Err(TrySendError::Full(_)) => thread::yield_now(),
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        log::warn!(target: "wire::dispatch", "could not queue socket rebind");
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        Arc::clone(&self.stats)
    }

    /// Number of tracks with a shadow entry (diagnostics).
    pub fn tracked(&self) -> usize {
        self.shadows.len()
    }
}

impl Drop for WireDispatch {
    fn drop(&mut self) {
        // Closing the channel ends the sender loop once the backlog drains.
        self.tx.take();
        if let Some(handle) = self.sender_thread.take() {
            let _ = handle.join();
        }
    }
}

fn open_socket(buffer_bytes: usize) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let sock_ref = socket2::SockRef::from(&socket);
    if let Err(e) = sock_ref.set_send_buffer_size(buffer_bytes) {
        log::warn!(target: "wire::dispatch", "could not size send buffer: {}", e);
    }
    Ok(socket)
}

fn sender_loop(
    device: SocketAddr,
    rx: Receiver<SendEntry>,
    generation: Arc<AtomicU64>,
    stats: Arc<LinkStats>,
    buffer_bytes: usize,
) {
    let mut socket = open_socket(buffer_bytes).ok();
    while let Ok(entry) = rx.recv() {
        match entry {
            SendEntry::Packet { generation: gen, buf } => {
                if gen < generation.load(Ordering::Relaxed) {
                    stats.dropped_stale.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let Some(sock) = socket.as_ref() else {
                    stats.send_errors.fetch_add(1, Ordering::Relaxed);
                    socket = open_socket(buffer_bytes).ok();
                    continue;
                };
                match sock.send_to(&buf, device) {
                    Ok(_) => {
                        stats.sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        stats.send_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            SendEntry::Rebind => {
                drop(socket.take());
                socket = open_socket(buffer_bytes).ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dispatch(settings: DispatchSettings) -> WireDispatch {
        // Nothing listens on the port; sends vanish, which is fine for
        // exercising the queueing logic.
        WireDispatch::new("127.0.0.1:19999".parse().unwrap(), settings).unwrap()
    }

    #[test]
    fn unchanged_proposal_dropped() {
        let mut dispatch = test_dispatch(DispatchSettings::default());
        let t0 = Instant::now();
        dispatch.propose(1, Position::new(1.0, 0.0, 0.0));
        dispatch.flush(t0);
        dispatch.propose(1, Position::new(1.0, 0.0, 0.0));
        dispatch.flush(t0 + Duration::from_millis(25));
        assert_eq!(dispatch.stats.dropped_unchanged.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn throttle_keeps_latest_pending() {
        let mut dispatch = test_dispatch(DispatchSettings {
            min_interval: Duration::from_millis(20),
            ..Default::default()
        });
        let t0 = Instant::now();
        dispatch.propose(1, Position::new(1.0, 0.0, 0.0));
        dispatch.flush(t0);
        // Two fast proposals inside the interval: the second replaces the first.
        dispatch.propose(1, Position::new(2.0, 0.0, 0.0));
        dispatch.flush(t0 + Duration::from_millis(5));
        dispatch.propose(1, Position::new(3.0, 0.0, 0.0));
        dispatch.flush(t0 + Duration::from_millis(10));
        let shadow = dispatch.shadows.get(&1).unwrap();
        assert_eq!(shadow.pending, Some(Position::new(3.0, 0.0, 0.0)));
        assert_eq!(shadow.last_sent, Some(Position::new(1.0, 0.0, 0.0)));
        // Once the interval elapses the pending value goes out.
        dispatch.flush(t0 + Duration::from_millis(25));
        let shadow = dispatch.shadows.get(&1).unwrap();
        assert_eq!(shadow.pending, None);
        assert_eq!(shadow.last_sent, Some(Position::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn queue_overflow_drops_and_counts() {
        let mut dispatch = test_dispatch(DispatchSettings {
            max_in_flight: 4,
            ..Default::default()
        });
        let now = Instant::now();
        // Flood far past the capacity; the sender thread may drain some, but
        // a 1000-message burst cannot all fit through a 4-slot queue.
        for i in 0..1000 {
            dispatch.send_message(protocol::track_gain(1, i as f32), now);
        }
        let stats = dispatch.stats.snapshot();
        assert!(stats.dropped_full > 0);
    }

    #[test]
    fn reset_marks_queued_packets_stale() {
        let mut dispatch = test_dispatch(DispatchSettings::default());
        let t0 = Instant::now();
        dispatch.propose(1, Position::new(1.0, 0.0, 0.0));
        dispatch.flush(t0);
        dispatch.reset();
        // After reset the shadow clock restarts: the next proposal sends
        // immediately even though 20ms have not elapsed.
        dispatch.propose(1, Position::new(5.0, 0.0, 0.0));
        dispatch.flush(t0 + Duration::from_millis(1));
        let shadow = dispatch.shadows.get(&1).unwrap();
        assert_eq!(shadow.last_sent, Some(Position::new(5.0, 0.0, 0.0)));
    }
}
