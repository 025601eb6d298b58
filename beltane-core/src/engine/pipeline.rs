//! Per-tick position assembly.
//!
//! Turns an instance plus the tick's delta time into a batch of
//! `(TrackId, Position)` updates: fold looping into an effective phase per
//! track, invoke the model, apply the whole-animation transform, guard
//! against non-finite output.

use std::collections::HashMap;
use std::f32::consts::TAU;

use beltane_types::{AnimationTransform, FormationPattern, Position, TrackId};

use crate::model::ModelCtx;

use super::instance::{AnimationInstance, InstanceStatus};

/// Result of advancing one instance by one tick.
#[derive(Debug, Default)]
pub struct InstanceTick {
    pub positions: Vec<(TrackId, Position)>,
    /// Finite animation ran out on every track.
    pub completed: bool,
    /// Return-to-rest ramp finished; the instance can be removed.
    pub ramp_done: bool,
}

/// Fold looping into the phase handed to the model.
/// Ping-pong runs forward on even cycles and backward on odd ones.
fn effective_phase(track_time: f64, duration: f32, looped: bool, ping_pong: bool) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    let duration = duration as f64;
    let phase = if !looped {
        track_time.min(duration)
    } else if !ping_pong {
        track_time.rem_euclid(duration)
    } else {
        let cycle = (track_time / duration).floor() as i64;
        let phase = track_time.rem_euclid(duration);
        if cycle % 2 == 0 {
            phase
        } else {
            duration - phase
        }
    };
    phase as f32
}

/// Rotation that carries +x onto `forward`, applied to a formation offset.
fn rotate_to_heading(offset: Position, forward: Position) -> Position {
    let Some(f) = forward.normalized() else {
        return offset;
    };
    let yaw = f.y.atan2(f.x);
    let pitch = f.z.clamp(-1.0, 1.0).asin();
    // pitch about y (nose up), then yaw about z
    let (sp, cp) = pitch.sin_cos();
    let pitched = Position::new(
        offset.x * cp + offset.z * sp,
        offset.y,
        -offset.x * sp + offset.z * cp,
    );
    let (sy, cy) = yaw.sin_cos();
    Position::new(
        pitched.x * cy - pitched.y * sy,
        pitched.x * sy + pitched.y * cy,
        pitched.z,
    )
}

/// Place a spherical-formation offset around the anchor. The offset encodes
/// (azimuth deg, elevation deg, radius); the sphere's local up is the
/// anchor's direction away from the formation origin.
fn place_on_sphere(offset: Position, anchor: Position, origin: Position) -> Position {
    let up = (anchor - origin)
        .normalized()
        .unwrap_or(Position::new(0.0, 0.0, 1.0));
    let local = Position::from_aed(offset.x, offset.y, offset.z);
    // Orthonormal basis with `up` as local z.
    let reference = if up.z.abs() < 0.99 {
        Position::new(0.0, 0.0, 1.0)
    } else {
        Position::new(1.0, 0.0, 0.0)
    };
    let u = reference
        .cross(&up)
        .normalized()
        .unwrap_or(Position::new(1.0, 0.0, 0.0));
    let v = up.cross(&u);
    anchor + u.scale(local.x) + v.scale(local.y) + up.scale(local.z)
}

/// Advance one instance by `dt` seconds and collect its position updates.
///
/// `rest` maps each track to its initial position (the return-to-rest
/// target, also the base for relative transforms).
pub fn advance_instance(
    instance: &mut AnimationInstance,
    dt: f64,
    rest: &HashMap<TrackId, Position>,
) -> InstanceTick {
    let mut out = InstanceTick::default();
    instance.wall += dt;

    match instance.status {
        InstanceStatus::Stopping => {
            advance_stop_ramp(instance, rest, &mut out);
            return out;
        }
        InstanceStatus::Paused => return out,
        InstanceStatus::Completed => return out,
        InstanceStatus::Running => {}
    }

    instance.elapsed += dt * instance.speed;
    let duration = instance.spec.duration;
    let looped = instance.loop_enabled;

    // Progress and loop count track the unshifted instance clock.
    if looped && duration > 0.0 {
        instance.loop_count = (instance.elapsed / duration as f64).floor().max(0.0) as u32;
        instance.progress =
            (instance.elapsed.rem_euclid(duration as f64) / duration as f64) as f32;
    } else if duration > 0.0 {
        instance.progress = (instance.elapsed / duration as f64).min(1.0) as f32;
    } else {
        instance.progress = 1.0;
    }

    // Formation transforms evaluate the model once per tick for the anchor.
    let formation_anchor = match instance.spec.transform {
        AnimationTransform::Formation { .. } => {
            let phase = effective_phase(instance.elapsed, duration, looped, instance.ping_pong);
            let phase = if instance.reverse { duration - phase } else { phase };
            let delta = (dt * instance.speed) as f32;
            let last = instance.prev_anchor;
            let mut slot = instance.anchor_state.take();
            let mut ctx = ModelCtx {
                track_id: 0,
                state: &mut slot,
                delta_time: delta,
                last_position: last,
            };
            let anchor = instance.model.calculate(&instance.params, phase, duration, &mut ctx);
            instance.anchor_state = slot;
            Some(anchor)
        }
        _ => None,
    };

    let tracks: Vec<TrackId> = instance.tracks.clone();
    let mut all_done = !tracks.is_empty();
    for track in tracks {
        let shift = instance.spec.track_transform(track).time_shift as f64;
        let track_time = instance.elapsed - shift;
        if track_time < 0.0 {
            // Phase shift not yet elapsed: the track holds.
            all_done = false;
            continue;
        }
        if !looped && track_time < duration as f64 {
            all_done = false;
        }

        let phase = effective_phase(track_time, duration, looped, instance.ping_pong);
        let phase = if instance.reverse { duration - phase } else { phase };

        let base = match formation_anchor {
            Some(anchor) => anchor,
            None => {
                let delta = (dt * instance.speed) as f32;
                let last = instance.last_positions.get(&track).copied();
                let slot = instance.track_state.entry(track).or_insert(None);
                let mut ctx = ModelCtx {
                    track_id: track,
                    state: slot,
                    delta_time: delta,
                    last_position: last,
                };
                instance.model.calculate(&instance.params, phase, duration, &mut ctx)
            }
        };

        let transform = instance.spec.track_transform(track);
        let final_pos = match instance.spec.transform {
            AnimationTransform::Absolute => base,
            AnimationTransform::Relative => {
                let initial = rest.get(&track).copied().unwrap_or(Position::ORIGIN);
                initial + base + transform.offset
            }
            AnimationTransform::Formation { anchor: origin, pattern } => match pattern {
                FormationPattern::Rigid => {
                    let heading = instance
                        .prev_anchor
                        .map(|prev| base - prev)
                        .unwrap_or(Position::ORIGIN);
                    base + rotate_to_heading(transform.offset, heading)
                }
                FormationPattern::Spherical => place_on_sphere(transform.offset, base, origin),
            },
        };

        if !final_pos.is_finite() {
            log::warn!(
                target: "engine::pipeline",
                "model '{}' produced a non-finite position for track {}, holding",
                instance.spec.model_id,
                track
            );
            if let Some(prev) = instance.last_positions.get(&track) {
                out.positions.push((track, *prev));
            }
            continue;
        }

        instance.last_positions.insert(track, final_pos);
        out.positions.push((track, final_pos));
    }

    if let Some(anchor) = formation_anchor {
        instance.prev_anchor = Some(anchor);
    }

    if !looped && all_done {
        instance.status = InstanceStatus::Completed;
        instance.progress = 1.0;
        out.completed = true;
    }
    out
}

fn advance_stop_ramp(
    instance: &mut AnimationInstance,
    rest: &HashMap<TrackId, Position>,
    out: &mut InstanceTick,
) {
    let Some(ramp) = &instance.stop_ramp else {
        out.ramp_done = true;
        return;
    };
    let elapsed = (instance.wall - ramp.started).max(0.0) as f32;
    let u = if ramp.duration <= 0.0 {
        1.0
    } else {
        (elapsed / ramp.duration).min(1.0)
    };
    let eased = ramp.easing.apply(u);
    for track in &instance.tracks {
        let target = rest.get(track).copied().unwrap_or(Position::ORIGIN);
        let from = ramp.from.get(track).copied().unwrap_or(target);
        let pos = if u >= 1.0 { target } else { from.lerp(&target, eased) };
        instance.last_positions.insert(*track, pos);
        out.positions.push((*track, pos));
    }
    if u >= 1.0 {
        out.ramp_done = true;
    }
}

/// Angular distance helper used by tests and diagnostics.
#[allow(dead_code)]
fn wrap_phase(phase: f32) -> f32 {
    phase.rem_euclid(TAU)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use beltane_types::{AnimationSpec, AnimationTransform, ParamValue, TrackTransform};

    use crate::engine::commands::StartInstance;
    use crate::model::ModelRegistry;

    use super::*;

    fn circle_spec(tracks: &[TrackId]) -> AnimationSpec {
        let mut spec = AnimationSpec::new(1, "circle", "circle")
            .with_param("center", ParamValue::Position(Position::ORIGIN))
            .with_param("radius", ParamValue::Float(5.0));
        spec.duration = 10.0;
        spec.loop_enabled = true;
        spec.tracks = tracks.to_vec();
        spec
    }

    fn instance_for(spec: AnimationSpec) -> AnimationInstance {
        let registry = ModelRegistry::builtin();
        let model = registry.get(&spec.model_id).unwrap().clone();
        let params = model.validate(&spec.parameters).unwrap();
        let tracks = spec.tracks.clone();
        let loop_enabled = spec.loop_enabled;
        let ping_pong = spec.ping_pong;
        AnimationInstance::new(StartInstance {
            instance: 1,
            spec: Arc::new(spec),
            model,
            params,
            tracks,
            speed: 1.0,
            loop_enabled,
            ping_pong,
            reverse: false,
        })
    }

    fn close(a: Position, b: Position, tol: f32) -> bool {
        a.distance(&b) < tol
    }

    #[test]
    fn circle_waypoints() {
        let mut instance = instance_for(circle_spec(&[1]));
        let rest = HashMap::new();
        // 2.5s in 0.05s ticks lands exactly on the quarter point.
        let mut last = Position::ORIGIN;
        for _ in 0..50 {
            let tick = advance_instance(&mut instance, 0.05, &rest);
            last = tick.positions[0].1;
        }
        assert!(close(last, Position::new(0.0, 5.0, 0.0), 1e-3));
    }

    #[test]
    fn independent_per_track_looping() {
        let mut spec = circle_spec(&[1, 2]);
        spec.track_transforms.insert(2, TrackTransform::shifted(2.0));
        let mut instance = instance_for(spec);
        let rest = HashMap::new();

        // Before the shift elapses only track 1 moves.
        let tick = advance_instance(&mut instance, 1.0, &rest);
        assert_eq!(tick.positions.len(), 1);
        assert_eq!(tick.positions[0].0, 1);

        // At t=5 the phases differ by exactly the shift.
        for _ in 0..4 {
            advance_instance(&mut instance, 1.0, &rest);
        }
        let p1 = instance.last_positions[&1];
        let p2 = instance.last_positions[&2];
        assert!(!close(p1, p2, 1e-3));
        // Track 2 at trackTime 3 matches track 1's position at t=3.
        let mut reference = instance_for(circle_spec(&[1]));
        for _ in 0..3 {
            advance_instance(&mut reference, 1.0, &rest);
        }
        assert!(close(p2, reference.last_positions[&1], 1e-3));
    }

    #[test]
    fn ping_pong_symmetry() {
        let mut spec = circle_spec(&[1]);
        spec.ping_pong = true;
        let mut forward = instance_for(spec.clone());
        let mut reflected = instance_for(spec);
        let rest = HashMap::new();

        // Even cycle, t = 3.
        for _ in 0..30 {
            advance_instance(&mut forward, 0.1, &rest);
        }
        // Odd cycle, t = duration + (duration - 3) = 17.
        for _ in 0..170 {
            advance_instance(&mut reflected, 0.1, &rest);
        }
        assert!(close(
            forward.last_positions[&1],
            reflected.last_positions[&1],
            1e-2
        ));
    }

    #[test]
    fn finite_animation_completes() {
        let mut spec = circle_spec(&[1]);
        spec.loop_enabled = false;
        spec.duration = 1.0;
        let mut instance = instance_for(spec);
        let rest = HashMap::new();
        let mut completed = false;
        for _ in 0..40 {
            completed |= advance_instance(&mut instance, 0.05, &rest).completed;
        }
        assert!(completed);
        assert_eq!(instance.status, InstanceStatus::Completed);
        assert_eq!(instance.progress, 1.0);
    }

    #[test]
    fn relative_adds_initial_and_offset() {
        let mut spec = AnimationSpec::new(2, "osc", "oscillator")
            .with_param("amplitude", ParamValue::Float(1.0))
            .with_param("frequency", ParamValue::Float(1.0));
        spec.duration = 10.0;
        spec.loop_enabled = true;
        spec.transform = AnimationTransform::Relative;
        spec.tracks = vec![1];
        spec.track_transforms
            .insert(1, TrackTransform::offset(Position::new(0.0, 1.0, 0.0)));
        let mut instance = instance_for(spec);
        let mut rest = HashMap::new();
        rest.insert(1, Position::new(10.0, 0.0, 0.0));

        // A full cycle later the oscillator is back at zero displacement.
        let mut last = Position::ORIGIN;
        for _ in 0..20 {
            let tick = advance_instance(&mut instance, 0.05, &rest);
            last = tick.positions[0].1;
        }
        // One full oscillator cycle: zero displacement, so the emitted
        // position is the initial plus the per-track offset.
        assert!(close(last, Position::new(10.0, 1.0, 0.0), 1e-2));
    }

    #[test]
    fn rigid_formation_preserves_distances() {
        let mut spec = circle_spec(&[1, 2, 3]);
        spec.transform = AnimationTransform::Formation {
            anchor: Position::ORIGIN,
            pattern: beltane_types::FormationPattern::Rigid,
        };
        spec.track_transforms
            .insert(1, TrackTransform::offset(Position::new(1.0, 0.0, 0.0)));
        spec.track_transforms
            .insert(2, TrackTransform::offset(Position::new(-1.0, 0.0, 0.0)));
        spec.track_transforms
            .insert(3, TrackTransform::offset(Position::new(0.0, 2.0, 0.0)));
        let mut instance = instance_for(spec);
        let rest = HashMap::new();

        for _ in 0..60 {
            advance_instance(&mut instance, 0.05, &rest);
            let p1 = instance.last_positions[&1];
            let p2 = instance.last_positions[&2];
            let p3 = instance.last_positions[&3];
            assert!((p1.distance(&p2) - 2.0).abs() < 1e-3);
            assert!((p1.distance(&p3) - (5.0_f32).sqrt()).abs() < 1e-3);
        }
    }

    #[test]
    fn non_finite_output_holds_previous() {
        // radial_zoom with a NaN far distance produces NaN from t > 0.
        let mut spec = AnimationSpec::new(3, "bad", "radial_zoom")
            .with_param("near", ParamValue::Float(1.0))
            .with_param("far", ParamValue::Float(f32::NAN));
        spec.duration = 1.0;
        spec.loop_enabled = false;
        spec.tracks = vec![1];
        let mut instance = instance_for(spec);
        let rest = HashMap::new();
        advance_instance(&mut instance, 0.0, &rest);
        let before = instance.last_positions.get(&1).copied();
        let tick = advance_instance(&mut instance, 0.5, &rest);
        match before {
            Some(prev) => {
                assert_eq!(tick.positions, vec![(1, prev)]);
            }
            None => assert!(tick.positions.is_empty()),
        }
    }

    #[test]
    fn stop_ramp_eases_out_then_lands() {
        let mut instance = instance_for(circle_spec(&[1]));
        let mut rest = HashMap::new();
        rest.insert(1, Position::new(0.0, 0.0, 1.0));
        // Drive away from rest, then stop.
        for _ in 0..20 {
            advance_instance(&mut instance, 0.05, &rest);
        }
        let displaced = instance.last_positions[&1];
        instance.begin_stop(instance.wall, 0.2, beltane_types::Easing::QuadOut);

        // Halfway through the ramp: strictly between, past the linear midpoint.
        let tick = advance_instance(&mut instance, 0.1, &rest);
        let mid = tick.positions[0].1;
        let target = Position::new(0.0, 0.0, 1.0);
        let total = displaced.distance(&target);
        assert!(mid.distance(&target) < total * 0.5);
        assert!(mid.distance(&displaced) > 0.0);

        // Past the ramp: exactly at rest, and the ramp reports done.
        let tick = advance_instance(&mut instance, 0.15, &rest);
        assert!(tick.ramp_done);
        assert_eq!(tick.positions[0].1, target);
    }

    #[test]
    fn double_stop_is_idempotent() {
        let mut instance = instance_for(circle_spec(&[1]));
        let rest = HashMap::new();
        advance_instance(&mut instance, 0.5, &rest);
        instance.begin_stop(instance.wall, 0.2, beltane_types::Easing::QuadOut);
        let started = instance.stop_ramp.as_ref().unwrap().started;
        advance_instance(&mut instance, 0.05, &rest);
        instance.begin_stop(instance.wall, 0.2, beltane_types::Easing::QuadOut);
        assert_eq!(instance.stop_ramp.as_ref().unwrap().started, started);
    }
}
