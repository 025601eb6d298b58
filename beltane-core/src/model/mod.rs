//! Motion-model registry.
//!
//! Models are pure position producers: `(params, time, duration, ctx)` in,
//! `Position` out. State-carrying models keep their state in a per-instance
//! per-track slot owned by the caller and threaded through [`ModelCtx`];
//! the registry itself is immutable once the engine starts.

mod curves;
mod params;
mod physics;

pub use params::{ModelParams, ParamKind, ParamSpec, Plane};
pub use physics::next_random;

use std::collections::HashMap;
use std::sync::Arc;

use beltane_types::{ParamValue, Position, TrackId};

use crate::error::EngineError;

pub use physics::{
    BounceState, KineticState, PendulumState, PerlinState, SpringState, WalkState,
};

/// Per-track opaque state for the state-carrying models.
#[derive(Debug, Clone)]
pub enum ModelState {
    Pendulum(PendulumState),
    Spring(SpringState),
    Bounce(BounceState),
    AttractRepel(KineticState),
    RandomWalk(WalkState),
    Perlin(PerlinState),
}

/// Per-call context: which track is being evaluated, its state slot, the
/// scheduler's delta time, and where the track was last frame (used to seed
/// the kinetic models).
pub struct ModelCtx<'a> {
    pub track_id: TrackId,
    pub state: &'a mut Option<ModelState>,
    pub delta_time: f32,
    pub last_position: Option<Position>,
}

type CustomModelFn =
    Arc<dyn Fn(&ModelParams, f32, f32, &mut ModelCtx) -> Position + Send + Sync>;

/// Built-in model kinds plus an escape hatch for user-registered functions.
#[derive(Clone)]
pub enum ModelKind {
    Line,
    Circle,
    Ellipse,
    Spiral,
    Helix,
    Bezier,
    CatmullRom,
    Oscillator,
    Lissajous,
    Rose,
    Epicycloid,
    Orbit,
    Doppler,
    CircularScan,
    RadialZoom,
    Pendulum,
    Spring,
    BouncedBall,
    AttractRepel,
    RandomWalk,
    PerlinDrift,
    Custom(CustomModelFn),
}

impl std::fmt::Debug for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelKind::Line => "Line",
            ModelKind::Circle => "Circle",
            ModelKind::Ellipse => "Ellipse",
            ModelKind::Spiral => "Spiral",
            ModelKind::Helix => "Helix",
            ModelKind::Bezier => "Bezier",
            ModelKind::CatmullRom => "CatmullRom",
            ModelKind::Oscillator => "Oscillator",
            ModelKind::Lissajous => "Lissajous",
            ModelKind::Rose => "Rose",
            ModelKind::Epicycloid => "Epicycloid",
            ModelKind::Orbit => "Orbit",
            ModelKind::Doppler => "Doppler",
            ModelKind::CircularScan => "CircularScan",
            ModelKind::RadialZoom => "RadialZoom",
            ModelKind::Pendulum => "Pendulum",
            ModelKind::Spring => "Spring",
            ModelKind::BouncedBall => "BouncedBall",
            ModelKind::AttractRepel => "AttractRepel",
            ModelKind::RandomWalk => "RandomWalk",
            ModelKind::PerlinDrift => "PerlinDrift",
            ModelKind::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

/// A registered motion model: identity, schema, capabilities, evaluation.
#[derive(Debug, Clone)]
pub struct MotionModel {
    pub id: String,
    pub kind: ModelKind,
    pub schema: Vec<ParamSpec>,
    /// Whether the model keeps per-track state between frames.
    pub stateful: bool,
    /// Whether the model repeats naturally when looped.
    pub periodic: bool,
}

impl MotionModel {
    /// Validate raw spec parameters against this model's schema.
    pub fn validate(
        &self,
        raw: &HashMap<String, ParamValue>,
    ) -> Result<ModelParams, EngineError> {
        ModelParams::validate(&self.id, &self.schema, raw)
    }

    /// Produce the position for `t` seconds into the (already loop-folded)
    /// cycle. Stateful models initialize their slot lazily on first call.
    pub fn calculate(
        &self,
        params: &ModelParams,
        t: f32,
        duration: f32,
        ctx: &mut ModelCtx,
    ) -> Position {
        match &self.kind {
            ModelKind::Line => curves::line(params, t, duration),
            ModelKind::Circle => curves::circle(params, t, duration),
            ModelKind::Ellipse => curves::ellipse(params, t, duration),
            ModelKind::Spiral => curves::spiral(params, t, duration),
            ModelKind::Helix => curves::helix(params, t, duration),
            ModelKind::Bezier => curves::bezier(params, t, duration),
            ModelKind::CatmullRom => curves::catmull_rom(params, t, duration),
            ModelKind::Oscillator => curves::oscillator(params, t, duration),
            ModelKind::Lissajous => curves::lissajous(params, t, duration),
            ModelKind::Rose => curves::rose(params, t, duration),
            ModelKind::Epicycloid => curves::epicycloid(params, t, duration),
            ModelKind::Orbit => curves::orbit(params, t, duration),
            ModelKind::Doppler => curves::doppler(params, t, duration),
            ModelKind::CircularScan => curves::circular_scan(params, t, duration),
            ModelKind::RadialZoom => curves::radial_zoom(params, t, duration),
            ModelKind::Pendulum => {
                if ctx.state.is_none() {
                    *ctx.state = Some(ModelState::Pendulum(physics::init_pendulum(params)));
                }
                match ctx.state {
                    Some(ModelState::Pendulum(s)) => {
                        physics::step_pendulum(params, s, ctx.delta_time)
                    }
                    _ => Position::ORIGIN,
                }
            }
            ModelKind::Spring => {
                if ctx.state.is_none() {
                    *ctx.state =
                        Some(ModelState::Spring(physics::init_spring(params, ctx.last_position)));
                }
                match ctx.state {
                    Some(ModelState::Spring(s)) => physics::step_spring(params, s, ctx.delta_time),
                    _ => Position::ORIGIN,
                }
            }
            ModelKind::BouncedBall => {
                if ctx.state.is_none() {
                    *ctx.state =
                        Some(ModelState::Bounce(physics::init_bounce(params, ctx.last_position)));
                }
                match ctx.state {
                    Some(ModelState::Bounce(s)) => physics::step_bounce(params, s, ctx.delta_time),
                    _ => Position::ORIGIN,
                }
            }
            ModelKind::AttractRepel => {
                if ctx.state.is_none() {
                    *ctx.state = Some(ModelState::AttractRepel(physics::init_attract(
                        params,
                        ctx.last_position,
                    )));
                }
                match ctx.state {
                    Some(ModelState::AttractRepel(s)) => {
                        physics::step_attract(params, s, ctx.delta_time)
                    }
                    _ => Position::ORIGIN,
                }
            }
            ModelKind::RandomWalk => {
                if ctx.state.is_none() {
                    *ctx.state =
                        Some(ModelState::RandomWalk(physics::init_walk(params, ctx.last_position)));
                }
                match ctx.state {
                    Some(ModelState::RandomWalk(s)) => {
                        physics::step_walk(params, s, ctx.delta_time)
                    }
                    _ => Position::ORIGIN,
                }
            }
            ModelKind::PerlinDrift => {
                if ctx.state.is_none() {
                    *ctx.state = Some(ModelState::Perlin(physics::init_perlin(params)));
                }
                match ctx.state {
                    Some(ModelState::Perlin(s)) => physics::step_perlin(params, s, ctx.delta_time),
                    _ => Position::ORIGIN,
                }
            }
            ModelKind::Custom(f) => f(params, t, duration, ctx),
        }
    }
}

/// Catalog of motion models. Populated at startup, then shared immutably.
pub struct ModelRegistry {
    models: HashMap<String, MotionModel>,
}

impl ModelRegistry {
    /// Registry with every built-in model.
    pub fn builtin() -> Self {
        let mut registry = Self { models: HashMap::new() };
        for model in builtin_models() {
            registry.insert(model);
        }
        registry
    }

    fn insert(&mut self, model: MotionModel) {
        self.models.insert(model.id.clone(), model);
    }

    /// Register a user model. Call before the registry is shared with the
    /// engine; the contract is the same as for built-ins.
    pub fn register(&mut self, model: MotionModel) {
        self.insert(model);
    }

    pub fn get(&self, id: &str) -> Result<&MotionModel, EngineError> {
        self.models
            .get(id)
            .ok_or_else(|| EngineError::UnknownModel(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn pos(x: f32, y: f32, z: f32) -> ParamValue {
    ParamValue::Position(Position::new(x, y, z))
}

fn builtin_models() -> Vec<MotionModel> {
    use ParamValue::{Float, Int, Text};

    let plane = || ParamSpec::optional("plane", Text("xy".into()));
    let center = || ParamSpec::optional("center", pos(0.0, 0.0, 0.0));
    let phase = || ParamSpec::optional("phase_deg", Float(0.0));

    vec![
        MotionModel {
            id: "line".into(),
            kind: ModelKind::Line,
            schema: vec![
                ParamSpec::required("start", ParamKind::Position),
                ParamSpec::required("end", ParamKind::Position),
            ],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "circle".into(),
            kind: ModelKind::Circle,
            schema: vec![
                center(),
                ParamSpec::optional("radius", Float(5.0)),
                plane(),
                phase(),
                ParamSpec::optional("clockwise", ParamValue::Bool(false)),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "ellipse".into(),
            kind: ModelKind::Ellipse,
            schema: vec![
                center(),
                ParamSpec::optional("radius_a", Float(5.0)),
                ParamSpec::optional("radius_b", Float(3.0)),
                plane(),
                phase(),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "spiral".into(),
            kind: ModelKind::Spiral,
            schema: vec![
                center(),
                ParamSpec::optional("start_radius", Float(0.5)),
                ParamSpec::optional("end_radius", Float(5.0)),
                ParamSpec::optional("turns", Float(3.0)),
                plane(),
            ],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "helix".into(),
            kind: ModelKind::Helix,
            schema: vec![
                center(),
                ParamSpec::optional("radius", Float(3.0)),
                ParamSpec::optional("turns", Float(3.0)),
                ParamSpec::optional("height", Float(4.0)),
                plane(),
            ],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "bezier".into(),
            kind: ModelKind::Bezier,
            schema: vec![
                ParamSpec::required("p0", ParamKind::Position),
                ParamSpec::required("p1", ParamKind::Position),
                ParamSpec::required("p2", ParamKind::Position),
                ParamSpec::required("p3", ParamKind::Position),
            ],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "catmull_rom".into(),
            kind: ModelKind::CatmullRom,
            schema: vec![ParamSpec::required("points", ParamKind::Positions)],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "oscillator".into(),
            kind: ModelKind::Oscillator,
            schema: vec![
                center(),
                ParamSpec::optional("direction", pos(1.0, 0.0, 0.0)),
                ParamSpec::optional("amplitude", Float(1.0)),
                ParamSpec::optional("frequency", Float(1.0)),
                ParamSpec::optional("waveform", Text("sine".into())),
                ParamSpec::optional("traveling", ParamValue::Bool(false)),
                ParamSpec::optional("velocity", pos(0.0, 0.0, 0.0)),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "lissajous".into(),
            kind: ModelKind::Lissajous,
            schema: vec![
                center(),
                ParamSpec::optional("amplitude", pos(3.0, 3.0, 0.0)),
                ParamSpec::optional("frequency", pos(3.0, 2.0, 0.0)),
                ParamSpec::optional("phase_deg", pos(90.0, 0.0, 0.0)),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "rose".into(),
            kind: ModelKind::Rose,
            schema: vec![
                center(),
                ParamSpec::optional("radius", Float(5.0)),
                ParamSpec::optional("petals", Int(4)),
                plane(),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "epicycloid".into(),
            kind: ModelKind::Epicycloid,
            schema: vec![
                center(),
                ParamSpec::optional("big_radius", Float(4.0)),
                ParamSpec::optional("small_radius", Float(1.0)),
                plane(),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "orbit".into(),
            kind: ModelKind::Orbit,
            schema: vec![
                center(),
                ParamSpec::optional("radius", Float(5.0)),
                ParamSpec::optional("inclination_deg", Float(30.0)),
                phase(),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "doppler".into(),
            kind: ModelKind::Doppler,
            schema: vec![
                center(),
                ParamSpec::optional("direction", pos(1.0, 0.0, 0.0)),
                ParamSpec::optional("span", Float(20.0)),
            ],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "circular_scan".into(),
            kind: ModelKind::CircularScan,
            schema: vec![
                center(),
                ParamSpec::optional("radius", Float(5.0)),
                ParamSpec::optional("start_deg", Float(-45.0)),
                ParamSpec::optional("end_deg", Float(45.0)),
                plane(),
            ],
            stateful: false,
            periodic: true,
        },
        MotionModel {
            id: "radial_zoom".into(),
            kind: ModelKind::RadialZoom,
            schema: vec![
                center(),
                ParamSpec::optional("azimuth_deg", Float(0.0)),
                ParamSpec::optional("elevation_deg", Float(0.0)),
                ParamSpec::optional("near", Float(1.0)),
                ParamSpec::optional("far", Float(10.0)),
            ],
            stateful: false,
            periodic: false,
        },
        MotionModel {
            id: "pendulum".into(),
            kind: ModelKind::Pendulum,
            schema: vec![
                ParamSpec::optional("anchor", pos(0.0, 0.0, 2.0)),
                ParamSpec::optional("length", Float(2.0)),
                ParamSpec::optional("start_deg", Float(45.0)),
                ParamSpec::optional("damping", Float(0.05)),
                ParamSpec::optional("gravity", Float(9.81)),
                plane(),
            ],
            stateful: true,
            periodic: false,
        },
        MotionModel {
            id: "spring".into(),
            kind: ModelKind::Spring,
            schema: vec![
                ParamSpec::optional("origin", pos(0.0, 0.0, 0.0)),
                ParamSpec::optional("displacement", pos(3.0, 0.0, 0.0)),
                ParamSpec::optional("stiffness", Float(8.0)),
                ParamSpec::optional("damping", Float(0.8)),
                ParamSpec::optional("mass", Float(1.0)),
            ],
            stateful: true,
            periodic: false,
        },
        MotionModel {
            id: "bounced_ball".into(),
            kind: ModelKind::BouncedBall,
            schema: vec![
                ParamSpec::optional("start", pos(0.0, 0.0, 5.0)),
                ParamSpec::optional("floor", Float(0.0)),
                ParamSpec::optional("gravity", Float(9.81)),
                ParamSpec::optional("restitution", Float(0.7)),
                ParamSpec::optional("velocity", pos(0.0, 0.0, 0.0)),
            ],
            stateful: true,
            periodic: false,
        },
        MotionModel {
            id: "attract_repel".into(),
            kind: ModelKind::AttractRepel,
            schema: vec![
                ParamSpec::optional("target", pos(0.0, 0.0, 0.0)),
                ParamSpec::optional("start", pos(5.0, 0.0, 0.0)),
                ParamSpec::optional("strength", Float(10.0)),
                ParamSpec::optional("damping", Float(0.3)),
            ],
            stateful: true,
            periodic: false,
        },
        MotionModel {
            id: "random_walk".into(),
            kind: ModelKind::RandomWalk,
            schema: vec![
                center(),
                ParamSpec::optional("extent", pos(5.0, 5.0, 2.0)),
                ParamSpec::optional("step_speed", Float(2.0)),
                ParamSpec::optional("seed", Int(1)),
            ],
            stateful: true,
            periodic: false,
        },
        MotionModel {
            id: "perlin_drift".into(),
            kind: ModelKind::PerlinDrift,
            schema: vec![
                center(),
                ParamSpec::optional("extent", pos(4.0, 4.0, 2.0)),
                ParamSpec::optional("speed", Float(0.3)),
                ParamSpec::optional("seed", Int(7)),
            ],
            stateful: true,
            periodic: false,
        },
    ]
}
