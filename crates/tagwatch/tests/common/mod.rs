#![allow(dead_code)]

use image::{Rgb, RgbImage};
use nalgebra::Point2;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagwatch::camera::{Camera, CaptureError};
use tagwatch_aruco::{MarkerDetector, TagDetection};
use tagwatch_core::GrayImage;

/// Counters shared between a test and its camera.
#[derive(Clone, Default)]
pub struct CameraCounters {
    pub captures: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
}

impl CameraCounters {
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Camera that blocks for `delay` per capture and fails on scripted calls.
pub struct ScriptedCamera {
    pub delay: Duration,
    /// Zero-based capture calls that fail.
    pub failures: VecDeque<usize>,
    pub width: u32,
    pub height: u32,
    pub counters: CameraCounters,
}

impl ScriptedCamera {
    pub fn new(delay: Duration, counters: CameraCounters) -> Self {
        Self {
            delay,
            failures: VecDeque::new(),
            width: 64,
            height: 48,
            counters,
        }
    }

    pub fn failing_on(mut self, calls: &[usize]) -> Self {
        self.failures = calls.iter().copied().collect();
        self
    }

    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl Camera for ScriptedCamera {
    fn capture(&mut self) -> Result<RgbImage, CaptureError> {
        let call = self.counters.captures.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if self.failures.front() == Some(&call) {
            self.failures.pop_front();
            return Err(CaptureError::Other(format!("scripted failure {call}")));
        }
        Ok(RgbImage::from_pixel(
            self.width,
            self.height,
            Rgb([200, 200, 200]),
        ))
    }

    fn release(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Detector that returns the same detections for every frame and counts
/// calls.
pub struct FakeDetector {
    pub detections: Vec<TagDetection>,
    pub calls: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl FakeDetector {
    pub fn new(detections: Vec<TagDetection>) -> Self {
        Self {
            detections,
            calls: Arc::default(),
        }
    }
}

impl MarkerDetector for FakeDetector {
    fn detect(&self, img: &GrayImage) -> Vec<TagDetection> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((img.width, img.height));
        }
        self.detections.clone()
    }
}

/// Axis-aligned square detection centred at `(cx, cy)`.
pub fn square_detection(id: u32, cx: f32, cy: f32, half: f32) -> TagDetection {
    TagDetection {
        id,
        hamming: 0,
        rotation: 0,
        center: Point2::new(cx, cy),
        corners: [
            Point2::new(cx - half, cy - half),
            Point2::new(cx + half, cy - half),
            Point2::new(cx + half, cy + half),
            Point2::new(cx - half, cy + half),
        ],
        score: 1.0,
    }
}
