//! Geometry shared by the tagwatch crates.
//!
//! Image views, the planar homography solver, the lens model used to
//! undistort frames, and recovery of a tag's pose from its four corners.
//! Nothing here knows about cameras, threads or marker dictionaries.

mod camera;
mod euler;
mod homography;
mod image;
mod logger;
mod numfmt;
mod pose;

pub use camera::{CameraIntrinsics, CameraModel, RadialTangentialDistortion, UndistortMap};
pub use euler::{standard_rad, PoseEuler};
pub use homography::{homography_from_4pt, Homography};
pub use image::{rgb_to_gray, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use numfmt::format_g6;
pub use pose::{camera_frame_pose, relative_pose, RelativePose};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
