//! Spatial values carried by replicated properties
//!
//! Equality is exact (`f32 ==` per component). Two values that differ only by
//! accumulated rounding are different values and will be replicated.

/// 3-component float vector
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Vector3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Linear interpolation, `t` clamped to [0, 1]
    pub fn lerp(self, target: Vector3, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Vector3::new(
            self.x + (target.x - self.x) * t,
            self.y + (target.y - self.y) * t,
            self.z + (target.z - self.z) * t,
        )
    }
}

/// Rotation quaternion, stored as (x, y, z, w)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Quaternion { x, y, z, w }
    }

    /// Rotation of `degrees` around the Y axis
    pub fn from_yaw_degrees(degrees: f32) -> Self {
        let half = degrees.to_radians() * 0.5;
        Quaternion::new(0.0, half.sin(), 0.0, half.cos())
    }

    #[inline]
    pub fn dot(self, other: Quaternion) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Angle in degrees between two rotations
    pub fn angle(self, other: Quaternion) -> f32 {
        let dot = self.dot(other).abs().min(1.0);
        (dot.acos() * 2.0).to_degrees()
    }

    /// Spherical interpolation along the shorter arc, `t` clamped to [0, 1]
    pub fn slerp(self, target: Quaternion, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mut dot = self.dot(target);
        let mut to = target;
        if dot < 0.0 {
            dot = -dot;
            to = Quaternion::new(-to.x, -to.y, -to.z, -to.w);
        }

        let (a, b) = if dot > 0.9995 {
            (1.0 - t, t)
        } else {
            let theta = dot.acos();
            let sin = theta.sin();
            (((1.0 - t) * theta).sin() / sin, (t * theta).sin() / sin)
        };

        Quaternion::new(
            self.x * a + to.x * b,
            self.y * a + to.y * b,
            self.z * a + to.z * b,
            self.w * a + to.w * b,
        )
        .normalized()
    }

    pub fn normalized(self) -> Self {
        let len = self.dot(self).sqrt();
        if len == 0.0 {
            return Quaternion::IDENTITY;
        }
        Quaternion::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}
