//! Interpolation modes for preset transitions.

use serde::{Deserialize, Serialize};

use crate::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Component-wise lerp.
    Cartesian,
    /// Slerp the angle about the origin, lerp the radius.
    Spherical,
    /// Cubic Bezier through caller-supplied control points.
    Bezier,
    /// Constant radius: rotate in the plane spanned by the endpoints.
    Circular,
}

impl Default for InterpolationMode {
    fn default() -> Self {
        Self::Cartesian
    }
}

impl InterpolationMode {
    pub fn name(&self) -> &'static str {
        match self {
            InterpolationMode::Cartesian => "cartesian",
            InterpolationMode::Spherical => "spherical",
            InterpolationMode::Bezier => "bezier",
            InterpolationMode::Circular => "circular",
        }
    }

    pub fn from_name(name: &str) -> Option<InterpolationMode> {
        match name {
            "cartesian" => Some(InterpolationMode::Cartesian),
            "spherical" => Some(InterpolationMode::Spherical),
            "bezier" => Some(InterpolationMode::Bezier),
            "circular" => Some(InterpolationMode::Circular),
            _ => None,
        }
    }
}

/// Interpolate between two positions. `t` is assumed already eased.
///
/// `ctrl` supplies the two inner control points for Bezier mode; the other
/// modes ignore it. Spherical and Circular fall back to Cartesian when an
/// endpoint sits at the origin (the rotation is undefined there).
pub fn interpolate(
    from: Position,
    to: Position,
    t: f32,
    mode: InterpolationMode,
    ctrl: Option<(Position, Position)>,
) -> Position {
    match mode {
        InterpolationMode::Cartesian => from.lerp(&to, t),
        InterpolationMode::Spherical => slerp(from, to, t),
        InterpolationMode::Bezier => match ctrl {
            Some((c1, c2)) => cubic_bezier(from, c1, c2, to, t),
            None => from.lerp(&to, t),
        },
        InterpolationMode::Circular => circular(from, to, t),
    }
}

/// Evaluate a cubic Bezier at `t`.
pub fn cubic_bezier(p0: Position, p1: Position, p2: Position, p3: Position, t: f32) -> Position {
    let u = 1.0 - t;
    let b0 = u * u * u;
    let b1 = 3.0 * u * u * t;
    let b2 = 3.0 * u * t * t;
    let b3 = t * t * t;
    p0.scale(b0) + p1.scale(b1) + p2.scale(b2) + p3.scale(b3)
}

fn slerp(from: Position, to: Position, t: f32) -> Position {
    let r_from = from.length();
    let r_to = to.length();
    let (Some(u), Some(v)) = (from.normalized(), to.normalized()) else {
        // Zero-radius endpoint: the arc is undefined, lerp instead.
        return from.lerp(&to, t);
    };
    let radius = r_from + (r_to - r_from) * t;
    let cos = u.dot(&v).clamp(-1.0, 1.0);
    let angle = cos.acos();
    if angle < 1e-6 {
        return from.lerp(&to, t);
    }
    let sin = angle.sin();
    if sin.abs() < 1e-6 {
        // Antipodal endpoints: no unique plane, fall back.
        return from.lerp(&to, t);
    }
    let a = ((1.0 - t) * angle).sin() / sin;
    let b = (t * angle).sin() / sin;
    let dir = u.scale(a) + v.scale(b);
    dir.scale(radius)
}

fn circular(from: Position, to: Position, t: f32) -> Position {
    let radius = from.length();
    let (Some(u), Some(v)) = (from.normalized(), to.normalized()) else {
        return from.lerp(&to, t);
    };
    let cos = u.dot(&v).clamp(-1.0, 1.0);
    let angle = cos.acos() * t;
    // Orthonormal basis of the plane spanned by the endpoints.
    let w = v - u.scale(u.dot(&v));
    let Some(w) = w.normalized() else {
        // Collinear endpoints: nothing to rotate through.
        return from.lerp(&to, t);
    };
    (u.scale(angle.cos()) + w.scale(angle.sin())).scale(radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Position, b: Position, tol: f32) -> bool {
        (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol && (a.z - b.z).abs() < tol
    }

    #[test]
    fn cartesian_midpoint() {
        let p = interpolate(
            Position::new(0.0, 0.0, 0.0),
            Position::new(2.0, 4.0, 6.0),
            0.5,
            InterpolationMode::Cartesian,
            None,
        );
        assert_eq!(p, Position::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn endpoints_exact_in_all_modes() {
        let from = Position::new(3.0, 1.0, 0.5);
        let to = Position::new(-1.0, 2.0, 4.0);
        let ctrl = Some((Position::new(0.0, 5.0, 0.0), Position::new(0.0, -5.0, 0.0)));
        for mode in [
            InterpolationMode::Cartesian,
            InterpolationMode::Spherical,
            InterpolationMode::Bezier,
            InterpolationMode::Circular,
        ] {
            let at0 = interpolate(from, to, 0.0, mode, ctrl);
            assert!(close(at0, from, 1e-4), "{} at 0", mode.name());
            if mode != InterpolationMode::Circular {
                // Circular holds |from| by construction, so it only reaches
                // `to` exactly when the radii agree.
                let at1 = interpolate(from, to, 1.0, mode, ctrl);
                assert!(close(at1, to, 1e-4), "{} at 1", mode.name());
            }
        }
    }

    #[test]
    fn spherical_lerps_radius() {
        let from = Position::new(2.0, 0.0, 0.0);
        let to = Position::new(0.0, 4.0, 0.0);
        let mid = interpolate(from, to, 0.5, InterpolationMode::Spherical, None);
        assert!((mid.length() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn spherical_zero_radius_falls_back() {
        let from = Position::ORIGIN;
        let to = Position::new(0.0, 4.0, 0.0);
        let mid = interpolate(from, to, 0.5, InterpolationMode::Spherical, None);
        assert!(close(mid, Position::new(0.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn circular_keeps_radius() {
        let from = Position::new(5.0, 0.0, 0.0);
        let to = Position::new(0.0, 3.0, 0.0);
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            let p = interpolate(from, to, t, InterpolationMode::Circular, None);
            assert!((p.length() - 5.0).abs() < 1e-4, "t={t}");
        }
    }
}
