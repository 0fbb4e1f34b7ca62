//! Per-frame processing: luminance, undistortion, detection, pose, reports.

use crate::annotate::Annotator;
use crate::config::CameraConfig;
use crate::frame::Frame;
use crate::report::{BearingWriter, PoseReport};
use image::RgbImage;
use std::time::{Duration, Instant};
use tagwatch_aruco::{MarkerDetector, TagDetection};
use tagwatch_core::{format_g6, rgb_to_gray, GrayImage, UndistortMap};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Switches that change what a pass does besides detecting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Log how long detection took.
    pub timing: bool,
    /// Produce an annotated colour frame.
    pub draw: bool,
}

/// Result of one pass.
#[derive(Debug)]
pub struct FrameReport {
    pub seq: u64,
    /// Detections in detector order.
    pub detections: Vec<TagDetection>,
    /// Poses of the detections whose pose could be recovered.
    pub reports: Vec<PoseReport>,
    pub detect_time: Duration,
    pub annotated: Option<RgbImage>,
}

pub struct DetectionPipeline {
    detector: Box<dyn MarkerDetector>,
    config: CameraConfig,
    options: PipelineOptions,
    undistort: Option<UndistortMap>,
    annotator: Annotator,
    bearing: Option<BearingWriter>,
}

impl DetectionPipeline {
    pub fn new(
        detector: Box<dyn MarkerDetector>,
        config: CameraConfig,
        options: PipelineOptions,
        annotator: Annotator,
    ) -> Self {
        let bearing = config
            .output
            .as_ref()
            .map(|p| BearingWriter::new(p, config.fov_deg));
        Self {
            detector,
            config,
            options,
            undistort: None,
            annotator,
            bearing,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn bearing_writer(&self) -> Option<&BearingWriter> {
        self.bearing.as_ref()
    }

    /// Map for the frame size, built on first use and whenever it changes.
    fn undistort_map(&mut self, width: usize, height: usize) -> &UndistortMap {
        let map = match self.undistort.take() {
            Some(m) if m.width() == width && m.height() == height => m,
            _ => {
                log::debug!("building undistortion map for {width}x{height}");
                self.config.model.undistort_map(width, height)
            }
        };
        self.undistort.insert(map)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(seq = frame.seq))
    )]
    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let gray = self.corrected_gray(frame, w, h);

        let started = Instant::now();
        let detections = self.detector.detect(&gray);
        let detect_time = started.elapsed();
        if self.options.timing {
            log::info!(
                "Extracting tags took {} seconds.",
                format_g6(detect_time.as_secs_f64())
            );
        }

        log::info!(
            "{} tags detected on {}:",
            detections.len(),
            self.config.display_name()
        );
        let k = self.config.pose_intrinsics();
        let mut reports = Vec::with_capacity(detections.len());
        for det in &detections {
            match det.relative_pose(self.config.tag_size, k.fx, k.fy, k.cx, k.cy) {
                Some(pose) => {
                    let report = PoseReport::new(det, &pose);
                    log::info!("{report}");
                    reports.push(report);
                }
                None => log::warn!("Id: {} pose could not be recovered", det.id),
            }
        }

        if let Some(writer) = &self.bearing {
            if let Err(e) = writer.write(&detections, frame.width(), frame.height()) {
                log::error!("failed to write {}: {e}", writer.path().display());
            }
        }

        let annotated = self
            .options
            .draw
            .then(|| self.annotated_frame(frame, &detections));

        FrameReport {
            seq: frame.seq,
            detections,
            reports,
            detect_time,
            annotated,
        }
    }

    fn corrected_gray(&mut self, frame: &Frame, w: usize, h: usize) -> GrayImage {
        let raw = rgb_to_gray(w, h, frame.image.as_raw())
            .unwrap_or_else(|| GrayImage::filled(w, h, 0));
        let corrected = self.undistort_map(w, h).remap_gray(&raw.view());
        corrected.unwrap_or(raw)
    }

    fn annotated_frame(&mut self, frame: &Frame, detections: &[TagDetection]) -> RgbImage {
        let (w, h) = (frame.width(), frame.height());
        let map = self.undistort_map(w as usize, h as usize);
        let mut img = map
            .remap_interleaved(frame.image.as_raw(), 3)
            .and_then(|data| RgbImage::from_raw(w, h, data))
            .unwrap_or_else(|| frame.image.clone());
        self.annotator.annotate(&mut img, detections);
        img
    }
}
