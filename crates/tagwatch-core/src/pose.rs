//! Relative pose of a square tag from its four image corners.

use crate::camera::CameraIntrinsics;
use crate::homography::homography_from_4pt;
use nalgebra::{Matrix3, Point2, Vector3};

/// Tag pose relative to the camera.
///
/// `translation` uses the object-facing convention (x forward, y left, z up),
/// so `translation.x` is the distance along the optical axis. `rotation` stays
/// in the camera frame (x right, y down, z forward), where yaw/pitch/roll line
/// up with the apparent orientation of the tag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativePose {
    pub translation: Vector3<f64>,
    pub rotation: Matrix3<f64>,
}

impl RelativePose {
    /// Euclidean distance from the camera to the tag centre.
    pub fn distance(&self) -> f64 {
        self.translation.norm()
    }
}

/// Tag corners in the unit object frame, canonical order.
const UNIT_SQUARE: [Point2<f32>; 4] = [
    Point2::new(-1.0, -1.0),
    Point2::new(1.0, -1.0),
    Point2::new(1.0, 1.0),
    Point2::new(-1.0, 1.0),
];

/// Camera-frame rotation and translation (x right, y down, z forward).
///
/// `corners` are image pixels in canonical tag order; `tag_size` is the side
/// length of the black square in metres.
pub fn camera_frame_pose(
    corners: &[Point2<f32>; 4],
    tag_size: f64,
    intrinsics: CameraIntrinsics,
) -> Option<(Matrix3<f64>, Vector3<f64>)> {
    if !intrinsics.is_valid() || !(tag_size > 0.0) {
        return None;
    }
    let h = homography_from_4pt(&UNIT_SQUARE, corners)?;

    // H = K * [r1 r2 t] up to scale
    let m = intrinsics.inv_matrix() * h.h;
    let mut r1 = m.column(0).into_owned();
    let mut r2 = m.column(1).into_owned();
    let mut t = m.column(2).into_owned();

    let norm = r1.norm() * r2.norm();
    if norm < 1e-18 {
        return None;
    }
    let mut scale = 1.0 / norm.sqrt();
    if t.z * scale < 0.0 {
        scale = -scale;
    }
    r1 *= scale;
    r2 *= scale;
    t *= scale;

    let r3 = r1.cross(&r2);
    let raw = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = raw.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        rotation = u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0)) * v_t;
    }

    // unit square spans 2 units per side
    let translation = t * (tag_size * 0.5);
    Some((rotation, translation))
}

/// Relative pose with the reporting conventions of [`RelativePose`].
pub fn relative_pose(
    corners: &[Point2<f32>; 4],
    tag_size: f64,
    intrinsics: CameraIntrinsics,
) -> Option<RelativePose> {
    let (rotation, t) = camera_frame_pose(corners, tag_size, intrinsics)?;
    Some(RelativePose {
        translation: Vector3::new(t.z, -t.x, -t.y),
        rotation,
    })
}
