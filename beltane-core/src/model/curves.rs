//! Stateless motion models: pure functions of (parameters, time, duration).

use std::f32::consts::TAU;

use beltane_types::{cubic_bezier, Position};

use super::params::{ModelParams, Plane};

/// Normalized phase in [0,1]. A non-positive duration pins the phase to 0.
fn norm(t: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        0.0
    } else {
        (t / duration).clamp(0.0, 1.0)
    }
}

pub fn line(p: &ModelParams, t: f32, duration: f32) -> Position {
    let start = p.position("start");
    let end = p.position("end");
    start.lerp(&end, norm(t, duration))
}

pub fn circle(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let radius = p.float("radius");
    let plane = Plane::parse(p.text("plane"));
    let mut angle = p.float("phase_deg").to_radians() + TAU * norm(t, duration);
    if p.boolean("clockwise") {
        angle = -angle;
    }
    plane.place(center, radius * angle.cos(), radius * angle.sin())
}

pub fn ellipse(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let a = p.float("radius_a");
    let b = p.float("radius_b");
    let plane = Plane::parse(p.text("plane"));
    let angle = p.float("phase_deg").to_radians() + TAU * norm(t, duration);
    plane.place(center, a * angle.cos(), b * angle.sin())
}

pub fn spiral(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let u = norm(t, duration);
    let radius = p.float("start_radius") + (p.float("end_radius") - p.float("start_radius")) * u;
    let angle = TAU * p.float("turns") * u;
    let plane = Plane::parse(p.text("plane"));
    plane.place(center, radius * angle.cos(), radius * angle.sin())
}

pub fn helix(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let radius = p.float("radius");
    let u = norm(t, duration);
    let angle = TAU * p.float("turns") * u;
    let plane = Plane::parse(p.text("plane"));
    let flat = plane.place(center, radius * angle.cos(), radius * angle.sin());
    flat + plane.normal().scale(p.float("height") * u)
}

pub fn bezier(p: &ModelParams, t: f32, duration: f32) -> Position {
    cubic_bezier(
        p.position("p0"),
        p.position("p1"),
        p.position("p2"),
        p.position("p3"),
        norm(t, duration),
    )
}

/// Catmull-Rom spline through the control points, endpoints doubled.
pub fn catmull_rom(p: &ModelParams, t: f32, duration: f32) -> Position {
    let points = p.positions("points");
    match points.len() {
        0 => Position::ORIGIN,
        1 => points[0],
        _ => {
            let segments = points.len() - 1;
            let u = norm(t, duration) * segments as f32;
            let seg = (u as usize).min(segments - 1);
            let local = u - seg as f32;
            let at = |i: isize| points[i.clamp(0, points.len() as isize - 1) as usize];
            let i = seg as isize;
            catmull_segment(at(i - 1), at(i), at(i + 1), at(i + 2), local)
        }
    }
}

fn catmull_segment(p0: Position, p1: Position, p2: Position, p3: Position, t: f32) -> Position {
    let t2 = t * t;
    let t3 = t2 * t;
    (p1.scale(2.0)
        + (p2 - p0).scale(t)
        + (p0.scale(2.0) - p1.scale(5.0) + p2.scale(4.0) - p3).scale(t2)
        + (p1.scale(3.0) - p0 - p2.scale(3.0) + p3).scale(t3))
    .scale(0.5)
}

fn waveform(shape: &str, phase: f32) -> f32 {
    // phase in cycles
    let frac = phase - phase.floor();
    match shape {
        "square" => {
            if frac < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        "triangle" => {
            if frac < 0.25 {
                4.0 * frac
            } else if frac < 0.75 {
                2.0 - 4.0 * frac
            } else {
                4.0 * frac - 4.0
            }
        }
        "saw" | "sawtooth" => 2.0 * frac - 1.0,
        _ => (TAU * frac).sin(),
    }
}

/// Stationary or traveling oscillation along a direction vector.
pub fn oscillator(p: &ModelParams, t: f32, _duration: f32) -> Position {
    let center = p.position("center");
    let dir = p.position("direction").normalized().unwrap_or(Position::new(1.0, 0.0, 0.0));
    let amp = p.float("amplitude");
    let freq = p.float("frequency");
    let wave = waveform(p.text("waveform"), freq * t);
    let mut pos = center + dir.scale(amp * wave);
    if p.boolean("traveling") {
        pos = pos + p.position("velocity").scale(t);
    }
    pos
}

pub fn lissajous(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let amp = p.position("amplitude");
    let freq = p.position("frequency");
    let phase = p.position("phase_deg");
    let u = TAU * norm(t, duration);
    center
        + Position::new(
            amp.x * (freq.x * u + phase.x.to_radians()).sin(),
            amp.y * (freq.y * u + phase.y.to_radians()).sin(),
            amp.z * (freq.z * u + phase.z.to_radians()).sin(),
        )
}

pub fn rose(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let theta = TAU * norm(t, duration);
    let r = p.float("radius") * (p.int("petals") as f32 * theta).cos();
    let plane = Plane::parse(p.text("plane"));
    plane.place(center, r * theta.cos(), r * theta.sin())
}

pub fn epicycloid(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let big = p.float("big_radius");
    let small = p.float("small_radius").max(1e-3);
    let theta = TAU * norm(t, duration);
    let sum = big + small;
    let u = sum * theta.cos() - small * ((sum / small) * theta).cos();
    let v = sum * theta.sin() - small * ((sum / small) * theta).sin();
    let plane = Plane::parse(p.text("plane"));
    plane.place(center, u, v)
}

/// Circle tilted out of the XY plane by an inclination about the x axis.
pub fn orbit(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let radius = p.float("radius");
    let incl = p.float("inclination_deg").to_radians();
    let angle = p.float("phase_deg").to_radians() + TAU * norm(t, duration);
    let flat_y = radius * angle.sin();
    center
        + Position::new(
            radius * angle.cos(),
            flat_y * incl.cos(),
            flat_y * incl.sin(),
        )
}

/// Constant-velocity pass through a closest-approach point.
pub fn doppler(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let dir = p.position("direction").normalized().unwrap_or(Position::new(1.0, 0.0, 0.0));
    let span = p.float("span");
    let u = norm(t, duration);
    center + dir.scale(-span + 2.0 * span * u)
}

/// Sweep an arc back and forth, like a radar head.
pub fn circular_scan(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let radius = p.float("radius");
    let start = p.float("start_deg").to_radians();
    let end = p.float("end_deg").to_radians();
    let u = norm(t, duration);
    // out on the first half, back on the second
    let sweep = if u < 0.5 { 2.0 * u } else { 2.0 - 2.0 * u };
    let angle = start + (end - start) * sweep;
    let plane = Plane::parse(p.text("plane"));
    plane.place(center, radius * angle.cos(), radius * angle.sin())
}

/// Move radially between two distances along a fixed bearing.
pub fn radial_zoom(p: &ModelParams, t: f32, duration: f32) -> Position {
    let center = p.position("center");
    let u = norm(t, duration);
    let dist = p.float("near") + (p.float("far") - p.float("near")) * u;
    center + Position::from_aed(p.float("azimuth_deg"), p.float("elevation_deg"), dist)
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

    fn close(a: Position, b: Position) -> bool {
        a.distance(&b) < 1e-4
    }

    #[test]
    fn circle_quarter_points() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("radius", ParamValue::Float(5.0)),
            ("plane", ParamValue::Text("xy".into())),
        ]);
        assert!(close(circle(&p, 0.0, 10.0), Position::new(5.0, 0.0, 0.0)));
        assert!(close(circle(&p, 2.5, 10.0), Position::new(0.0, 5.0, 0.0)));
        assert!(close(circle(&p, 5.0, 10.0), Position::new(-5.0, 0.0, 0.0)));
        assert!(close(circle(&p, 7.5, 10.0), Position::new(0.0, -5.0, 0.0)));
        assert!(close(circle(&p, 10.0, 10.0), Position::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn line_endpoints() {
        let p = params(vec![
            ("start", ParamValue::Position(Position::new(1.0, 1.0, 1.0))),
            ("end", ParamValue::Position(Position::new(3.0, 3.0, 3.0))),
        ]);
        assert!(close(line(&p, 0.0, 4.0), Position::new(1.0, 1.0, 1.0)));
        assert!(close(line(&p, 2.0, 4.0), Position::new(2.0, 2.0, 2.0)));
        assert!(close(line(&p, 4.0, 4.0), Position::new(3.0, 3.0, 3.0)));
    }

    #[test]
    fn zero_duration_pins_phase() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("radius", ParamValue::Float(2.0)),
        ]);
        assert!(close(circle(&p, 0.0, 0.0), Position::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn catmull_rom_hits_knots() {
        let pts = vec![
            Position::new(0.0, 0.0, 0.0),
            Position::new(1.0, 2.0, 0.0),
            Position::new(3.0, 1.0, 0.0),
        ];
        let p = params(vec![("points", ParamValue::Positions(pts.clone()))]);
        assert!(close(catmull_rom(&p, 0.0, 2.0), pts[0]));
        assert!(close(catmull_rom(&p, 1.0, 2.0), pts[1]));
        assert!(close(catmull_rom(&p, 2.0, 2.0), pts[2]));
    }

    #[test]
    fn oscillator_square_flips() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("direction", ParamValue::Position(Position::new(0.0, 0.0, 1.0))),
            ("amplitude", ParamValue::Float(1.0)),
            ("frequency", ParamValue::Float(1.0)),
            ("waveform", ParamValue::Text("square".into())),
        ]);
        assert!(oscillator(&p, 0.1, 10.0).z > 0.9);
        assert!(oscillator(&p, 0.6, 10.0).z < -0.9);
    }

    #[test]
    fn helix_rises() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("radius", ParamValue::Float(1.0)),
            ("turns", ParamValue::Float(2.0)),
            ("height", ParamValue::Float(4.0)),
        ]);
        let end = helix(&p, 10.0, 10.0);
        assert!((end.z - 4.0).abs() < 1e-4);
    }

    #[test]
    fn circular_scan_returns_to_start() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("radius", ParamValue::Float(3.0)),
            ("start_deg", ParamValue::Float(-45.0)),
            ("end_deg", ParamValue::Float(45.0)),
        ]);
        assert!(close(circular_scan(&p, 0.0, 8.0), circular_scan(&p, 8.0, 8.0)));
    }

    #[test]
    fn radial_zoom_distances() {
        let p = params(vec![
            ("center", ParamValue::Position(Position::ORIGIN)),
            ("near", ParamValue::Float(1.0)),
            ("far", ParamValue::Float(9.0)),
        ]);
        assert!((radial_zoom(&p, 0.0, 2.0).length() - 1.0).abs() < 1e-4);
        assert!((radial_zoom(&p, 2.0, 2.0).length() - 9.0).abs() < 1e-4);
    }
}
