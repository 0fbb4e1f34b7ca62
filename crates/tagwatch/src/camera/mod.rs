//! Frame sources.
//!
//! [`Camera`] is all the producer needs: grab one image, and give the device
//! back when done. [`StillImageCamera`] replays files from disk; the V4L2
//! backend is behind the `v4l` feature.

use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(feature = "v4l")]
mod v4l;
#[cfg(feature = "v4l")]
pub use self::v4l::V4lCamera;

/// Device could not be opened or configured.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("failed to open video device {index}: {source}")]
    Open {
        index: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("device {index} does not support {what}")]
    Unsupported { index: u32, what: String },
    #[error("no input images given")]
    NoImages,
    #[error("failed to load image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("exposure, gain and brightness need the `v4l` feature")]
    ControlsUnavailable,
    #[error("live capture needs the `v4l` feature; pass image files instead")]
    NoBackend,
}

/// A single capture failed; the device is still usable.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame has {got} bytes, expected {expected}")]
    ShortFrame { got: usize, expected: usize },
    #[error("{0}")]
    Other(String),
}

/// Manual exposure settings; `None` leaves the driver default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraControls {
    /// 0..=10000; enables manual exposure mode.
    pub exposure: Option<i32>,
    /// 0..=255.
    pub gain: Option<i32>,
    /// 0..=255.
    pub brightness: Option<i32>,
}

impl CameraControls {
    pub fn is_empty(&self) -> bool {
        self.exposure.is_none() && self.gain.is_none() && self.brightness.is_none()
    }
}

/// Blocking frame source owned by the capture thread.
pub trait Camera: Send {
    /// Block until the next frame is available.
    fn capture(&mut self) -> Result<RgbImage, CaptureError>;

    /// Give the device back. Called exactly once, after the last capture.
    fn release(&mut self);
}

/// Replays a list of image files forever, resized to the configured
/// resolution.
pub struct StillImageCamera {
    frames: Vec<RgbImage>,
    next: usize,
}

impl StillImageCamera {
    pub fn open(paths: &[PathBuf], width: u32, height: u32) -> Result<Self, CameraError> {
        if paths.is_empty() {
            return Err(CameraError::NoImages);
        }
        let frames = paths
            .iter()
            .map(|p| load_resized(p, width, height))
            .collect::<Result<Vec<_>, _>>()?;
        log::info!("replaying {} image(s) at {width}x{height}", frames.len());
        Ok(Self { frames, next: 0 })
    }

    /// Wrap already decoded images.
    pub fn from_images(frames: Vec<RgbImage>) -> Result<Self, CameraError> {
        if frames.is_empty() {
            return Err(CameraError::NoImages);
        }
        Ok(Self { frames, next: 0 })
    }
}

fn load_resized(path: &Path, width: u32, height: u32) -> Result<RgbImage, CameraError> {
    let img = image::open(path)
        .map_err(|source| CameraError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgb8();
    if img.dimensions() == (width, height) {
        return Ok(img);
    }
    log::debug!(
        "resizing {} from {}x{} to {width}x{height}",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(image::imageops::resize(&img, width, height, FilterType::Triangle))
}

impl Camera for StillImageCamera {
    fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        let Some(frame) = self.frames.get(self.next).cloned() else {
            return Err(CaptureError::Other("image source released".to_string()));
        };
        self.next = (self.next + 1) % self.frames.len();
        Ok(frame)
    }

    fn release(&mut self) {
        self.frames.clear();
        self.frames.shrink_to_fit();
        self.next = 0;
        log::debug!("image source released");
    }
}
