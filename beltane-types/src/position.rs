use serde::{Deserialize, Serialize};

/// A 3D position in device coordinates. Units are whatever the device uses;
/// the engine only guarantees the components stay finite.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True when all three components are finite (no NaN, no infinity).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (*other - *self).length()
    }

    pub fn dot(&self, other: &Position) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Position) -> Position {
        Position::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction, or None for a (near-)zero vector.
    pub fn normalized(&self) -> Option<Position> {
        let len = self.length();
        if len < 1e-9 {
            None
        } else {
            Some(Position::new(self.x / len, self.y / len, self.z / len))
        }
    }

    pub fn scale(&self, s: f32) -> Position {
        Position::new(self.x * s, self.y * s, self.z * s)
    }

    /// Component-wise linear interpolation.
    pub fn lerp(&self, to: &Position, t: f32) -> Position {
        Position::new(
            self.x + (to.x - self.x) * t,
            self.y + (to.y - self.y) * t,
            self.z + (to.z - self.z) * t,
        )
    }

    /// Convert to (azimuth, elevation, distance). Angles in degrees, matching
    /// the device's `aed` addresses. Azimuth 0 is +x, counter-clockwise in XY;
    /// elevation is the angle above the XY plane.
    pub fn to_aed(&self) -> (f32, f32, f32) {
        let dist = self.length();
        if dist < 1e-9 {
            return (0.0, 0.0, 0.0);
        }
        let azim = self.y.atan2(self.x).to_degrees();
        let elev = (self.z / dist).clamp(-1.0, 1.0).asin().to_degrees();
        (azim, elev, dist)
    }

    /// Rebuild a Cartesian position from (azimuth, elevation, distance) in degrees.
    pub fn from_aed(azim: f32, elev: f32, dist: f32) -> Position {
        let az = azim.to_radians();
        let el = elev.to_radians();
        Position::new(
            dist * el.cos() * az.cos(),
            dist * el.cos() * az.sin(),
            dist * el.sin(),
        )
    }

    /// Centroid of a set of positions. Origin for an empty set.
    pub fn centroid(points: &[Position]) -> Position {
        if points.is_empty() {
            return Position::ORIGIN;
        }
        let mut sum = Position::ORIGIN;
        for p in points {
            sum = sum + *p;
        }
        sum.scale(1.0 / points.len() as f32)
    }
}

impl std::ops::Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Position {
    type Output = Position;
    fn mul(self, rhs: f32) -> Position {
        self.scale(rhs)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}
