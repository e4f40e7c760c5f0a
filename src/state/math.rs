use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Car orientation as three orthonormal axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotMat {
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
}

impl Default for RotMat {
    fn default() -> Self {
        Self {
            forward: Vec3::new(1.0, 0.0, 0.0),
            right: Vec3::new(0.0, 1.0, 0.0),
            up: Vec3::new(0.0, 0.0, 1.0),
        }
    }
}

impl RotMat {
    /// Orientation from Euler angles in radians; a car at rest has forward +x
    /// and up +z.
    pub fn from_euler(pitch: f32, yaw: f32, roll: f32) -> Self {
        let (cp, sp) = (pitch.cos(), pitch.sin());
        let (cy, sy) = (yaw.cos(), yaw.sin());
        let (cr, sr) = (roll.cos(), roll.sin());

        Self {
            forward: Vec3::new(cp * cy, cp * sy, sp),
            right: Vec3::new(cr * sy - cy * sp * sr, -sy * sp * sr - cr * cy, cp * sr),
            up: Vec3::new(-cr * cy * sp - sr * sy, -cr * sy * sp + sr * cy, cp * cr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_rot_mat_identity() {
        let rot = RotMat::from_euler(0.0, 0.0, 0.0);
        assert!((rot.forward.x - 1.0).abs() < 1e-6);
        assert!((rot.up.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rot_mat_yaw_quarter_turn() {
        let rot = RotMat::from_euler(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        assert!(rot.forward.x.abs() < 1e-6);
        assert!((rot.forward.y - 1.0).abs() < 1e-6);
    }
}
