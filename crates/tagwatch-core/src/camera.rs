//! Pinhole intrinsics, Brown-Conrady distortion and image undistortion.
//!
//! Undistortion follows the usual inverse-mapping approach: for every pixel of
//! the corrected image, project through the distortion model to find where it
//! came from in the raw image, then sample bilinearly. The mapping depends only
//! on the camera model and the resolution, so it is computed once into an
//! [`UndistortMap`] and reused for every frame.

use crate::image::{sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Returns `true` when all parameters are finite and focal lengths non-zero.
    pub fn is_valid(self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx.abs() > 1e-12
            && self.fy.abs() > 1e-12
    }

    pub fn as_matrix(self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    pub fn inv_matrix(self) -> Matrix3<f64> {
        Matrix3::new(
            1.0 / self.fx,
            0.0,
            -self.cx / self.fx,
            0.0,
            1.0 / self.fy,
            -self.cy / self.fy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Convert pixel coordinates to normalized pinhole coordinates.
    pub fn pixel_to_normalized(self, pixel_xy: [f64; 2]) -> [f64; 2] {
        [
            (pixel_xy[0] - self.cx) / self.fx,
            (pixel_xy[1] - self.cy) / self.fy,
        ]
    }

    /// Convert normalized pinhole coordinates to pixel coordinates.
    pub fn normalized_to_pixel(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        [
            self.fx * normalized_xy[0] + self.cx,
            self.fy * normalized_xy[1] + self.cy,
        ]
    }
}

/// Brown-Conrady radial-tangential distortion coefficients, OpenCV order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RadialTangentialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl RadialTangentialDistortion {
    /// Build from the `[k1, k2, p1, p2, k3]` coefficient vector.
    pub fn from_coeffs(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn coeffs(self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_identity(self) -> bool {
        self.coeffs().iter().all(|c| *c == 0.0)
    }

    /// Apply distortion to normalized coordinates.
    pub fn distort_normalized(self, normalized_xy: [f64; 2]) -> [f64; 2] {
        let x = normalized_xy[0];
        let y = normalized_xy[1];
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        [x * radial + x_tan, y * radial + y_tan]
    }
}

/// Calibrated lens model used to correct raw frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraModel {
    pub intrinsics: CameraIntrinsics,
    pub distortion: RadialTangentialDistortion,
}

impl Default for CameraModel {
    /// Calibration of the webcams the rig was built around.
    fn default() -> Self {
        Self {
            intrinsics: CameraIntrinsics::new(
                462.63107599,
                462.21461581,
                326.21297766,
                176.90908288,
            ),
            distortion: RadialTangentialDistortion::from_coeffs([
                0.09591939,
                -0.19559665,
                0.00127468,
                0.00103905,
                0.09594666,
            ]),
        }
    }
}

impl CameraModel {
    /// Model that leaves images untouched.
    pub fn ideal(width: usize, height: usize) -> Self {
        Self {
            intrinsics: CameraIntrinsics::new(1.0, 1.0, width as f64 / 2.0, height as f64 / 2.0),
            distortion: RadialTangentialDistortion::default(),
        }
    }

    /// Raw-image pixel that lands on `undistorted_xy` after correction.
    pub fn source_pixel(&self, undistorted_xy: [f64; 2]) -> [f64; 2] {
        let n = self.intrinsics.pixel_to_normalized(undistorted_xy);
        let d = self.distortion.distort_normalized(n);
        self.intrinsics.normalized_to_pixel(d)
    }

    /// Precompute the per-pixel lookup for a `width × height` image.
    pub fn undistort_map(&self, width: usize, height: usize) -> UndistortMap {
        let mut src = Vec::with_capacity(width * height);
        let identity = self.distortion.is_identity() || !self.intrinsics.is_valid();
        for y in 0..height {
            for x in 0..width {
                let p = [x as f64, y as f64];
                let s = if identity { p } else { self.source_pixel(p) };
                src.push([s[0] as f32, s[1] as f32]);
            }
        }
        UndistortMap { width, height, src }
    }
}

/// Per-pixel source coordinates for undistortion.
#[derive(Clone, Debug)]
pub struct UndistortMap {
    width: usize,
    height: usize,
    src: Vec<[f32; 2]>,
}

impl UndistortMap {
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Source pixel for output pixel `(x, y)`.
    #[inline]
    pub fn source(&self, x: usize, y: usize) -> [f32; 2] {
        self.src[y * self.width + x]
    }

    /// Undistort a grayscale image. Returns `None` on a size mismatch.
    pub fn remap_gray(&self, img: &GrayImageView<'_>) -> Option<GrayImage> {
        if img.width != self.width || img.height != self.height {
            return None;
        }
        let data = self
            .src
            .iter()
            .map(|s| sample_bilinear_u8(img, s[0], s[1]))
            .collect();
        Some(GrayImage {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Undistort an interleaved image with `channels` bytes per pixel.
    ///
    /// Pixels that map outside the source are filled with zeros.
    pub fn remap_interleaved(&self, data: &[u8], channels: usize) -> Option<Vec<u8>> {
        if channels == 0 || data.len() != self.width * self.height * channels {
            return None;
        }
        let mut out = vec![0u8; data.len()];
        for (i, s) in self.src.iter().enumerate() {
            let base = i * channels;
            for c in 0..channels {
                out[base + c] = self.sample_channel(data, channels, c, s[0], s[1]);
            }
        }
        Some(out)
    }

    fn sample_channel(&self, data: &[u8], channels: usize, c: usize, x: f32, y: f32) -> u8 {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let get = |xx: i32, yy: i32| -> f32 {
            if xx < 0 || yy < 0 || xx >= self.width as i32 || yy >= self.height as i32 {
                return 0.0;
            }
            data[(yy as usize * self.width + xx as usize) * channels + c] as f32
        };
        let a = get(x0, y0) + fx * (get(x0 + 1, y0) - get(x0, y0));
        let b = get(x0, y0 + 1) + fx * (get(x0 + 1, y0 + 1) - get(x0, y0 + 1));
        (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8
    }
}
