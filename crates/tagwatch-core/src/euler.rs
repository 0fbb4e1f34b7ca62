//! Yaw/pitch/roll decomposition of tag rotations.

use nalgebra::Matrix3;
use std::f64::consts::PI;
use std::fmt;

const TWO_PI: f64 = 2.0 * PI;

/// Wrap an angle into `(-π, π]`.
///
/// Non-negative inputs map through `fmod(t + π, 2π) - π`, negative inputs
/// through `fmod(t - π, -2π) + π`. Both odd multiples of `π` land on `+π`,
/// so the map is idempotent.
#[inline]
pub fn standard_rad(t: f64) -> f64 {
    // `%` on f64 is C fmod: the result carries the sign of the dividend
    let w = if t >= 0.0 {
        (t + PI) % TWO_PI - PI
    } else {
        (t - PI) % -TWO_PI + PI
    };
    if w <= -PI {
        w + TWO_PI
    } else {
        w
    }
}

/// Euler angles in radians, each in `(-π, π]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PoseEuler {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl PoseEuler {
    /// Z-Y-X decomposition of a rotation matrix.
    pub fn from_rotation(r: &Matrix3<f64>) -> Self {
        let yaw = standard_rad(r[(1, 0)].atan2(r[(0, 0)]));
        let (s, c) = yaw.sin_cos();
        let pitch = standard_rad((-r[(2, 0)]).atan2(r[(0, 0)] * c + r[(1, 0)] * s));
        let roll = standard_rad(
            (r[(0, 2)] * s - r[(1, 2)] * c).atan2(-r[(0, 1)] * s + r[(1, 1)] * c),
        );
        Self { yaw, pitch, roll }
    }

    /// Orientation of a tag from its camera-frame rotation.
    ///
    /// The image y axis points down; flipping it first makes a positive yaw
    /// read as a counter-clockwise turn in the picture.
    pub fn from_camera_rotation(rotation: &Matrix3<f64>) -> Self {
        let flip = Matrix3::from_diagonal(&nalgebra::Vector3::new(1.0, -1.0, 1.0));
        Self::from_rotation(&(flip * rotation))
    }
}

impl fmt::Display for PoseEuler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "yaw={}, pitch={}, roll={}",
            crate::format_g6(self.yaw),
            crate::format_g6(self.pitch),
            crate::format_g6(self.roll)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    #[test]
    fn standard_rad_stays_in_range() {
        for i in -200..=200 {
            let t = i as f64 * 0.173;
            let w = standard_rad(t);
            assert!(w > -PI && w <= PI, "{t} -> {w}");
            assert_relative_eq!(w.sin(), t.sin(), epsilon = 1e-9);
            assert_relative_eq!(w.cos(), t.cos(), epsilon = 1e-9);
        }
    }

    #[test]
    fn standard_rad_is_idempotent_inside_range() {
        for t in [-3.0, -1.0, 0.0, 0.5, 3.0] {
            assert_relative_eq!(standard_rad(standard_rad(t)), standard_rad(t), epsilon = 1e-12);
            assert_relative_eq!(standard_rad(t), t, epsilon = 1e-12);
        }
        assert_relative_eq!(standard_rad(TWO_PI + 0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(standard_rad(-TWO_PI - 0.5), -0.5, epsilon = 1e-12);

        // the half-turn has one representative, +π
        for t in [PI, -PI, 3.0 * PI, -3.0 * PI] {
            assert_eq!(standard_rad(t), PI, "{t}");
            assert_eq!(standard_rad(standard_rad(t)), standard_rad(t), "{t}");
        }
    }

    #[test]
    fn identity_has_zero_angles() {
        let e = PoseEuler::from_rotation(&Matrix3::identity());
        assert_eq!(e, PoseEuler::default());
    }

    #[test]
    fn quarter_turn_about_z_is_pure_yaw() {
        let r = Rotation3::from_euler_angles(0.0, 0.0, PI / 2.0).into_inner();
        let e = PoseEuler::from_rotation(&r);
        assert_relative_eq!(e.yaw, PI / 2.0, epsilon = 1e-9);
        assert_relative_eq!(e.pitch, 0.0, epsilon = 1e-9);
        assert_relative_eq!(e.roll, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn decomposition_recovers_composed_angles() {
        let (roll, pitch, yaw) = (0.3, PI / 2.0 - 1e-3, -0.7);
        let r = Rotation3::from_euler_angles(roll, pitch, yaw).into_inner();
        let e = PoseEuler::from_rotation(&r);
        assert_relative_eq!(e.yaw, yaw, epsilon = 1e-6);
        assert_relative_eq!(e.pitch, pitch, epsilon = 1e-6);
        assert_relative_eq!(e.roll, roll, epsilon = 1e-6);
    }

    #[test]
    fn camera_rotation_flips_image_y() {
        let e = PoseEuler::from_camera_rotation(&Matrix3::identity());
        // the y flip shows up entirely in roll
        assert_relative_eq!(e.yaw, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.pitch, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.roll, PI, epsilon = 1e-12);
    }

    #[test]
    fn display_uses_six_significant_digits() {
        let e = PoseEuler {
            yaw: 0.5,
            pitch: -1.23456789,
            roll: 0.0,
        };
        assert_eq!(e.to_string(), "yaw=0.5, pitch=-1.23457, roll=0");
    }
}
