use image::RgbImage;
use std::time::Instant;

/// One captured image plus where it sits in the capture sequence.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Producer-assigned, strictly increasing from 0.
    pub seq: u64,
    pub captured_at: Instant,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self {
            seq,
            captured_at: Instant::now(),
            image,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
