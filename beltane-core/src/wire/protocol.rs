//! OSC address construction and inbound decoding for the device protocol.
//!
//! Outbound positions go out fused (`/track/{id}/xyz`) by default; the
//! axis-individual, relative-delta, and `aed` forms are available for
//! protocol cues and accepted inbound. Control messages addressed to the
//! engine itself (`/cue/...`, `/animation/...`) are decoded here too.

use beltane_types::{AnimationId, CueId, Position, TrackId, WireArg, WireMessage};
use rosc::{OscMessage, OscPacket, OscType};

pub fn track_xyz(id: TrackId, pos: Position) -> OscMessage {
    OscMessage {
        addr: format!("/track/{}/xyz", id),
        args: vec![
            OscType::Float(pos.x),
            OscType::Float(pos.y),
            OscType::Float(pos.z),
        ],
    }
}

pub fn track_aed(id: TrackId, pos: Position) -> OscMessage {
    let (a, e, d) = pos.to_aed();
    OscMessage {
        addr: format!("/track/{}/aed", id),
        args: vec![OscType::Float(a), OscType::Float(e), OscType::Float(d)],
    }
}

pub fn track_color(id: TrackId, color: &str) -> OscMessage {
    OscMessage {
        addr: format!("/track/{}/color", id),
        args: vec![OscType::String(color.to_string())],
    }
}

pub fn track_gain(id: TrackId, gain: f32) -> OscMessage {
    OscMessage {
        addr: format!("/track/{}/gain/value", id),
        args: vec![OscType::Float(gain)],
    }
}

pub fn track_mute(id: TrackId, mute: bool) -> OscMessage {
    OscMessage {
        addr: format!("/track/{}/mute", id),
        args: vec![OscType::Int(if mute { 1 } else { 0 })],
    }
}

/// `/get "<path>"`: the device answers on the queried address.
pub fn get_query(path: &str) -> OscMessage {
    OscMessage {
        addr: "/get".to_string(),
        args: vec![OscType::String(path.to_string())],
    }
}

/// Convert a cue's stored wire message to OSC.
pub fn from_wire_message(msg: &WireMessage) -> OscMessage {
    OscMessage {
        addr: msg.address.clone(),
        args: msg
            .args
            .iter()
            .map(|a| match a {
                WireArg::Float(v) => OscType::Float(*v),
                WireArg::Int(v) => OscType::Int(*v),
                WireArg::Text(v) => OscType::String(v.clone()),
                WireArg::Bool(v) => OscType::Bool(*v),
            })
            .collect(),
    }
}

/// One of the three spatial axes, shared by the set and delta forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    TrackXyz { track: TrackId, pos: Position },
    TrackAed { track: TrackId, azim: f32, elev: f32, dist: f32 },
    TrackAxis { track: TrackId, axis: Axis, value: f32 },
    /// `/track/{id}/x+` and friends: a signed delta on one axis.
    TrackAxisDelta { track: TrackId, axis: Axis, delta: f32 },
    TrackAzim { track: TrackId, value: f32 },
    TrackElev { track: TrackId, value: f32 },
    TrackDist { track: TrackId, value: f32 },
    TrackGain { track: TrackId, value: f32 },
    TrackMute { track: TrackId, mute: bool },
    TrackColor { track: TrackId, color: String },
    /// `/get "<path>"` addressed at the engine.
    Get { path: String },
    CueGo { cue: CueId },
    AnimationPlay { animation: AnimationId },
    AnimationPause { animation: AnimationId },
    AnimationStop { animation: AnimationId },
    AnimationLoop { animation: AnimationId, enabled: bool },
    AnimationSpeed { animation: AnimationId, speed: f32 },
    AnimationTime { animation: AnimationId, seconds: f32 },
}

fn float_arg(args: &[OscType], index: usize) -> Option<f32> {
    match args.get(index)? {
        OscType::Float(v) => Some(*v),
        OscType::Double(v) => Some(*v as f32),
        OscType::Int(v) => Some(*v as f32),
        _ => None,
    }
}

fn bool_arg(args: &[OscType], index: usize) -> Option<bool> {
    match args.get(index)? {
        OscType::Bool(v) => Some(*v),
        OscType::Int(v) => Some(*v != 0),
        OscType::Float(v) => Some(*v != 0.0),
        _ => None,
    }
}

fn string_arg(args: &[OscType], index: usize) -> Option<String> {
    match args.get(index)? {
        OscType::String(v) => Some(v.clone()),
        _ => None,
    }
}

/// Decode every message in a packet, recursing through bundles.
/// Unrecognized addresses are skipped.
pub fn decode_packet(packet: &OscPacket, out: &mut Vec<Inbound>) {
    match packet {
        OscPacket::Message(msg) => {
            if let Some(inbound) = decode_message(msg) {
                out.push(inbound);
            }
        }
        OscPacket::Bundle(bundle) => {
            for p in &bundle.content {
                decode_packet(p, out);
            }
        }
    }
}

fn decode_message(msg: &OscMessage) -> Option<Inbound> {
    let parts: Vec<&str> = msg.addr.split('/').filter(|s| !s.is_empty()).collect();
    match parts.as_slice() {
        ["track", id, rest @ ..] => {
            let track: TrackId = id.parse().ok()?;
            decode_track(track, rest, &msg.args)
        }
        ["get"] => Some(Inbound::Get { path: string_arg(&msg.args, 0)? }),
        ["cue", id, "go"] => Some(Inbound::CueGo { cue: id.parse().ok()? }),
        ["animation", id, op] => {
            let animation: AnimationId = id.parse().ok()?;
            match *op {
                "play" => Some(Inbound::AnimationPlay { animation }),
                "pause" => Some(Inbound::AnimationPause { animation }),
                "stop" => Some(Inbound::AnimationStop { animation }),
                "loop" => Some(Inbound::AnimationLoop {
                    animation,
                    enabled: bool_arg(&msg.args, 0)?,
                }),
                "speed" => Some(Inbound::AnimationSpeed {
                    animation,
                    speed: float_arg(&msg.args, 0)?,
                }),
                "time" => Some(Inbound::AnimationTime {
                    animation,
                    seconds: float_arg(&msg.args, 0)?,
                }),
                _ => None,
            }
        }
        _ => None,
    }
}

fn decode_track(track: TrackId, rest: &[&str], args: &[OscType]) -> Option<Inbound> {
    let axis = |name: &str| match name {
        "x" => Some(Axis::X),
        "y" => Some(Axis::Y),
        "z" => Some(Axis::Z),
        _ => None,
    };
    match rest {
        ["xyz"] => Some(Inbound::TrackXyz {
            track,
            pos: Position::new(float_arg(args, 0)?, float_arg(args, 1)?, float_arg(args, 2)?),
        }),
        ["aed"] => Some(Inbound::TrackAed {
            track,
            azim: float_arg(args, 0)?,
            elev: float_arg(args, 1)?,
            dist: float_arg(args, 2)?,
        }),
        ["azim"] => Some(Inbound::TrackAzim { track, value: float_arg(args, 0)? }),
        ["elev"] => Some(Inbound::TrackElev { track, value: float_arg(args, 0)? }),
        ["dist"] => Some(Inbound::TrackDist { track, value: float_arg(args, 0)? }),
        ["gain", "value"] => Some(Inbound::TrackGain { track, value: float_arg(args, 0)? }),
        ["mute"] => Some(Inbound::TrackMute { track, mute: bool_arg(args, 0)? }),
        ["color"] => Some(Inbound::TrackColor { track, color: string_arg(args, 0)? }),
        [one] => {
            let name = *one;
            if let Some(a) = axis(name) {
                return Some(Inbound::TrackAxis { track, axis: a, value: float_arg(args, 0)? });
            }
            // x+ / x- relative forms
            if name.len() == 2 {
                let (head, sign) = name.split_at(1);
                let a = axis(head)?;
                let magnitude = float_arg(args, 0)?;
                let delta = match sign {
                    "+" => magnitude,
                    "-" => -magnitude,
                    _ => return None,
                };
                return Some(Inbound::TrackAxisDelta { track, axis: a, delta });
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(msg: OscMessage) -> Option<Inbound> {
        let mut out = Vec::new();
        decode_packet(&OscPacket::Message(msg), &mut out);
        out.into_iter().next()
    }

    #[test]
    fn xyz_round_trip() {
        let msg = track_xyz(3, Position::new(1.0, -2.0, 0.5));
        assert_eq!(msg.addr, "/track/3/xyz");
        let decoded = decode_one(msg).unwrap();
        assert_eq!(
            decoded,
            Inbound::TrackXyz { track: 3, pos: Position::new(1.0, -2.0, 0.5) }
        );
    }

    #[test]
    fn relative_delta_signs() {
        let plus = OscMessage {
            addr: "/track/7/x+".to_string(),
            args: vec![OscType::Float(0.25)],
        };
        let minus = OscMessage {
            addr: "/track/7/y-".to_string(),
            args: vec![OscType::Float(0.5)],
        };
        assert_eq!(
            decode_one(plus).unwrap(),
            Inbound::TrackAxisDelta { track: 7, axis: Axis::X, delta: 0.25 }
        );
        assert_eq!(
            decode_one(minus).unwrap(),
            Inbound::TrackAxisDelta { track: 7, axis: Axis::Y, delta: -0.5 }
        );
    }

    #[test]
    fn cue_and_animation_control() {
        let go = OscMessage { addr: "/cue/12/go".to_string(), args: vec![] };
        assert_eq!(decode_one(go).unwrap(), Inbound::CueGo { cue: 12 });

        let speed = OscMessage {
            addr: "/animation/4/speed".to_string(),
            args: vec![OscType::Float(1.5)],
        };
        assert_eq!(
            decode_one(speed).unwrap(),
            Inbound::AnimationSpeed { animation: 4, speed: 1.5 }
        );

        let looped = OscMessage {
            addr: "/animation/4/loop".to_string(),
            args: vec![OscType::Bool(true)],
        };
        assert_eq!(
            decode_one(looped).unwrap(),
            Inbound::AnimationLoop { animation: 4, enabled: true }
        );
    }

    #[test]
    fn unknown_addresses_skipped() {
        let noise = OscMessage { addr: "/meter/levels".to_string(), args: vec![] };
        assert!(decode_one(noise).is_none());
        let bad_id = OscMessage {
            addr: "/track/abc/xyz".to_string(),
            args: vec![OscType::Float(0.0); 3],
        };
        assert!(decode_one(bad_id).is_none());
    }

    #[test]
    fn bundles_flattened() {
        let bundle = OscPacket::Bundle(rosc::OscBundle {
            timetag: rosc::OscTime { seconds: 0, fractional: 1 },
            content: vec![
                OscPacket::Message(track_gain(1, 0.8)),
                OscPacket::Message(track_mute(2, true)),
            ],
        });
        let mut out = Vec::new();
        decode_packet(&bundle, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], Inbound::TrackMute { track: 2, mute: true });
    }
}
