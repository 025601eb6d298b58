//! State-carrying motion models, advanced by the scheduler's delta time.

use beltane_types::Position;

use super::params::{ModelParams, Plane};

/// Same LCG used for every seeded randomness in the engine, so runs replay
/// identically for a given seed.
pub fn next_random(state: &mut u64) -> f32 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    ((*state >> 33) as f32) / (u32::MAX as f32)
}

/// Clamp integration steps so a stalled tick cannot explode the simulations.
const MAX_STEP: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct PendulumState {
    pub angle: f32,
    pub velocity: f32,
}

pub fn init_pendulum(p: &ModelParams) -> PendulumState {
    PendulumState { angle: p.float("start_deg").to_radians(), velocity: 0.0 }
}

pub fn step_pendulum(p: &ModelParams, state: &mut PendulumState, dt: f32) -> Position {
    let anchor = p.position("anchor");
    let length = p.float("length").max(1e-3);
    let damping = p.float("damping");
    let gravity = p.float("gravity");
    let dt = dt.clamp(0.0, MAX_STEP);
    let accel = -(gravity / length) * state.angle.sin() - damping * state.velocity;
    state.velocity += accel * dt;
    state.angle += state.velocity * dt;
    let swing = length * state.angle.sin();
    let drop = -length * state.angle.cos();
    match Plane::parse(p.text("plane")) {
        Plane::Yz => Position::new(anchor.x, anchor.y + swing, anchor.z + drop),
        _ => Position::new(anchor.x + swing, anchor.y, anchor.z + drop),
    }
}

#[derive(Debug, Clone)]
pub struct SpringState {
    pub offset: Position,
    pub velocity: Position,
}

pub fn init_spring(p: &ModelParams, last: Option<Position>) -> SpringState {
    // Prefer a displacement derived from where the track actually is.
    let offset = match last {
        Some(pos) => pos - p.position("origin"),
        None => p.position("displacement"),
    };
    SpringState { offset, velocity: Position::ORIGIN }
}

pub fn step_spring(p: &ModelParams, state: &mut SpringState, dt: f32) -> Position {
    let origin = p.position("origin");
    let stiffness = p.float("stiffness");
    let damping = p.float("damping");
    let mass = p.float("mass").max(1e-3);
    let dt = dt.clamp(0.0, MAX_STEP);
    let accel = state.offset.scale(-stiffness / mass) + state.velocity.scale(-damping / mass);
    state.velocity = state.velocity + accel.scale(dt);
    state.offset = state.offset + state.velocity.scale(dt);
    origin + state.offset
}

#[derive(Debug, Clone)]
pub struct BounceState {
    pub position: Position,
    pub velocity: Position,
}

pub fn init_bounce(p: &ModelParams, last: Option<Position>) -> BounceState {
    BounceState {
        position: last.unwrap_or_else(|| p.position("start")),
        velocity: p.position("velocity"),
    }
}

pub fn step_bounce(p: &ModelParams, state: &mut BounceState, dt: f32) -> Position {
    let floor = p.float("floor");
    let restitution = p.float("restitution").clamp(0.0, 1.0);
    let gravity = p.float("gravity");
    let dt = dt.clamp(0.0, MAX_STEP);
    state.velocity.z -= gravity * dt;
    state.position = state.position + state.velocity.scale(dt);
    if state.position.z < floor {
        state.position.z = floor;
        if state.velocity.z < 0.0 {
            state.velocity.z = -state.velocity.z * restitution;
        }
    }
    state.position
}

#[derive(Debug, Clone)]
pub struct KineticState {
    pub position: Position,
    pub velocity: Position,
}

pub fn init_attract(p: &ModelParams, last: Option<Position>) -> KineticState {
    KineticState {
        position: last.unwrap_or_else(|| p.position("start")),
        velocity: Position::ORIGIN,
    }
}

/// Inverse-square pull toward (strength > 0) or push away from (< 0) a target.
pub fn step_attract(p: &ModelParams, state: &mut KineticState, dt: f32) -> Position {
    let target = p.position("target");
    let strength = p.float("strength");
    let damping = p.float("damping");
    let dt = dt.clamp(0.0, MAX_STEP);
    let to_target = target - state.position;
    let dist2 = to_target.dot(&to_target).max(0.25);
    if let Some(dir) = to_target.normalized() {
        state.velocity = state.velocity + dir.scale(strength / dist2 * dt);
    }
    state.velocity = state.velocity.scale((1.0 - damping * dt).max(0.0));
    state.position = state.position + state.velocity.scale(dt);
    state.position
}

#[derive(Debug, Clone)]
pub struct WalkState {
    pub position: Position,
    pub velocity: Position,
    pub rng: u64,
}

pub fn init_walk(p: &ModelParams, last: Option<Position>) -> WalkState {
    WalkState {
        position: last.unwrap_or_else(|| p.position("center")),
        velocity: Position::ORIGIN,
        rng: p.int("seed").max(1) as u64,
    }
}

/// Bounded random walk: jittered velocity, reflected at the box walls.
pub fn step_walk(p: &ModelParams, state: &mut WalkState, dt: f32) -> Position {
    let center = p.position("center");
    let extent = p.position("extent");
    let speed = p.float("step_speed");
    let dt = dt.clamp(0.0, MAX_STEP);

    let jitter = Position::new(
        next_random(&mut state.rng) * 2.0 - 1.0,
        next_random(&mut state.rng) * 2.0 - 1.0,
        next_random(&mut state.rng) * 2.0 - 1.0,
    );
    state.velocity = (state.velocity + jitter.scale(speed * 4.0 * dt)).scale(0.98);
    let max = speed.max(1e-3);
    if state.velocity.length() > max {
        if let Some(dir) = state.velocity.normalized() {
            state.velocity = dir.scale(max);
        }
    }
    state.position = state.position + state.velocity.scale(dt);

    reflect_axis(&mut state.position.x, &mut state.velocity.x, center.x, extent.x);
    reflect_axis(&mut state.position.y, &mut state.velocity.y, center.y, extent.y);
    reflect_axis(&mut state.position.z, &mut state.velocity.z, center.z, extent.z);
    state.position
}

fn reflect_axis(pos: &mut f32, vel: &mut f32, center: f32, extent: f32) {
    if extent <= 0.0 {
        *pos = center;
        *vel = 0.0;
        return;
    }
    if *pos > center + extent {
        *pos = center + extent;
        *vel = -vel.abs();
    } else if *pos < center - extent {
        *pos = center - extent;
        *vel = vel.abs();
    }
}

#[derive(Debug, Clone)]
pub struct PerlinState {
    perm: [u8; 256],
    /// Accumulated noise-space time.
    pub t: f64,
}

pub fn init_perlin(p: &ModelParams) -> PerlinState {
    let mut perm = [0u8; 256];
    for (i, v) in perm.iter_mut().enumerate() {
        *v = i as u8;
    }
    // Fisher-Yates with the shared LCG
    let mut rng = p.int("seed").max(1) as u64;
    for i in (1..256).rev() {
        let j = (next_random(&mut rng) * (i + 1) as f32) as usize % (i + 1);
        perm.swap(i, j);
    }
    PerlinState { perm, t: 0.0 }
}

/// Smooth drift inside a box, one 1D gradient noise stream per axis.
pub fn step_perlin(p: &ModelParams, state: &mut PerlinState, dt: f32) -> Position {
    let center = p.position("center");
    let extent = p.position("extent");
    let speed = p.float("speed");
    state.t += (dt.clamp(0.0, MAX_STEP) * speed) as f64;
    let t = state.t as f32;
    center
        + Position::new(
            extent.x * noise1(&state.perm, t),
            extent.y * noise1(&state.perm, t + 57.0),
            extent.z * noise1(&state.perm, t + 131.0),
        )
}

fn gradient(perm: &[u8; 256], cell: i32) -> f32 {
    let h = perm[(cell & 255) as usize];
    // map the hashed byte to a slope in [-1, 1]
    (h as f32 / 127.5) - 1.0
}

/// 1D gradient noise in roughly [-1, 1] with smoothstep fade.
fn noise1(perm: &[u8; 256], t: f32) -> f32 {
    let cell = t.floor() as i32;
    let frac = t - t.floor();
    let g0 = gradient(perm, cell) * frac;
    let g1 = gradient(perm, cell + 1) * (frac - 1.0);
    let fade = frac * frac * (3.0 - 2.0 * frac);
    (g0 + (g1 - g0) * fade) * 2.0
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use beltane_types::ParamValue;

    use super::*;

    fn params(entries: Vec<(&str, ParamValue)>) -> ModelParams {
        let map: HashMap<String, ParamValue> =
            entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        ModelParams::from_values(map)
    }

    #[test]
    fn pendulum_swings_back() {
        let p = params(vec![
            ("anchor", ParamValue::Position(Position::new(0.0, 0.0, 2.0))),
            ("length", ParamValue::Float(1.0)),
            ("start_deg", ParamValue::Float(30.0)),
            ("damping", ParamValue::Float(0.0)),
            ("gravity", ParamValue::Float(9.81)),
        ]);
        let mut state = init_pendulum(&p);
        let first = step_pendulum(&p, &mut state, 0.01);
        assert!(first.x > 0.0);
        // Integrate long enough to cross the vertical.
        let mut crossed = false;
        for _ in 0..400 {
            let pos = step_pendulum(&p, &mut state, 0.01);
            if pos.x < 0.0 {
                crossed = true;
                break;
            }
        }
        assert!(crossed, "pendulum never swung past the vertical");
    }

    #[test]
    fn spring_settles_at_origin() {
        let p = params(vec![
            ("origin", ParamValue::Position(Position::new(1.0, 0.0, 0.0))),
            ("displacement", ParamValue::Position(Position::new(2.0, 0.0, 0.0))),
            ("stiffness", ParamValue::Float(20.0)),
            ("damping", ParamValue::Float(4.0)),
            ("mass", ParamValue::Float(1.0)),
        ]);
        let mut state = init_spring(&p, None);
        let mut pos = Position::ORIGIN;
        for _ in 0..2000 {
            pos = step_spring(&p, &mut state, 0.01);
        }
        assert!(pos.distance(&Position::new(1.0, 0.0, 0.0)) < 0.05);
    }

    #[test]
    fn bounce_stays_above_floor() {
        let p = params(vec![
            ("start", ParamValue::Position(Position::new(0.0, 0.0, 3.0))),
            ("floor", ParamValue::Float(0.0)),
            ("gravity", ParamValue::Float(9.81)),
            ("restitution", ParamValue::Float(0.6)),
            ("velocity", ParamValue::Position(Position::new(0.5, 0.0, 0.0))),
        ]);
        let mut state = init_bounce(&p, None);
        for _ in 0..1000 {
            let pos = step_bounce(&p, &mut state, 0.01);
            assert!(pos.z >= -1e-6);
        }
    }

    #[test]
    fn walk_stays_in_bounds() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("extent", ParamValue::Position(Position::new(2.0, 2.0, 1.0))),
            ("step_speed", ParamValue::Float(3.0)),
            ("seed", ParamValue::Int(42)),
        ]);
        let mut state = init_walk(&p, None);
        for _ in 0..2000 {
            let pos = step_walk(&p, &mut state, 0.033);
            assert!(pos.x.abs() <= 2.0 + 1e-4);
            assert!(pos.y.abs() <= 2.0 + 1e-4);
            assert!(pos.z.abs() <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn walk_replays_with_same_seed() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("extent", ParamValue::Position(Position::new(2.0, 2.0, 1.0))),
            ("step_speed", ParamValue::Float(3.0)),
            ("seed", ParamValue::Int(7)),
        ]);
        let mut a = init_walk(&p, None);
        let mut b = init_walk(&p, None);
        for _ in 0..100 {
            assert_eq!(step_walk(&p, &mut a, 0.033), step_walk(&p, &mut b, 0.033));
        }
    }

    #[test]
    fn perlin_bounded_and_smooth() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("extent", ParamValue::Position(Position::new(4.0, 4.0, 2.0))),
            ("speed", ParamValue::Float(0.5)),
            ("seed", ParamValue::Int(9)),
        ]);
        let mut state = init_perlin(&p);
        let mut prev = step_perlin(&p, &mut state, 0.033);
        for _ in 0..500 {
            let pos = step_perlin(&p, &mut state, 0.033);
            assert!(pos.x.abs() <= 8.0 && pos.y.abs() <= 8.0 && pos.z.abs() <= 4.0);
            // Adjacent frames stay close: drift, not teleport.
            assert!(pos.distance(&prev) < 1.0);
            prev = pos;
        }
    }
}
