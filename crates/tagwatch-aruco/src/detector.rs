//! Whole-image tag detection.

use crate::decode::{CellDecoder, DecodeConfig};
use crate::quad::{dark_components, fit_quad, QuadParams};
use crate::threshold::image_threshold;
use crate::{Dictionary, Matcher};
use nalgebra::Point2;
use tagwatch_core::{relative_pose, CameraIntrinsics, GrayImage, GrayImageView, RelativePose};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One decoded tag.
#[derive(Clone, Debug, PartialEq)]
pub struct TagDetection {
    pub id: u32,
    pub hamming: u8,
    /// Quarter turns between the observed code and the dictionary code.
    pub rotation: u8,
    /// Intersection of the diagonals, image pixels.
    pub center: Point2<f32>,
    /// Corners in tag order: the tag's own top-left, top-right, bottom-right,
    /// bottom-left, wherever they land in the image.
    pub corners: [Point2<f32>; 4],
    /// Border darkness weighted by the bit error rate, in `[0, 1]`.
    pub score: f32,
}

impl TagDetection {
    /// Pose of the tag for a camera with focal lengths `fx, fy` and
    /// principal point `px, py`; `tag_size` is the black square side in
    /// metres.
    pub fn relative_pose(
        &self,
        tag_size: f64,
        fx: f64,
        fy: f64,
        px: f64,
        py: f64,
    ) -> Option<RelativePose> {
        relative_pose(
            &self.corners,
            tag_size,
            CameraIntrinsics::new(fx, fy, px, py),
        )
    }
}

/// Anything that turns a grayscale frame into tag detections.
pub trait MarkerDetector {
    /// Detections in the order the detector found them.
    fn detect(&self, img: &GrayImage) -> Vec<TagDetection>;
}

/// Detector parameters.
#[derive(Clone, Debug)]
pub struct TagDetectorParams {
    /// Upper bound on corrected bits; also capped by the dictionary.
    pub max_hamming: u8,
    pub quad: QuadParams,
    pub decode: DecodeConfig,
}

impl Default for TagDetectorParams {
    fn default() -> Self {
        Self {
            max_hamming: 2,
            quad: QuadParams::default(),
            decode: DecodeConfig::default(),
        }
    }
}

/// Threshold, segment, fit quads, decode.
#[derive(Clone, Debug)]
pub struct TagDetector {
    matcher: Matcher,
    params: TagDetectorParams,
}

impl TagDetector {
    pub fn new(dict: Dictionary, params: TagDetectorParams) -> Self {
        let matcher = Matcher::new(dict, params.max_hamming);
        Self { matcher, params }
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    pub fn params(&self) -> &TagDetectorParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img), fields(w = img.width, h = img.height))
    )]
    pub fn detect_view(&self, img: &GrayImageView<'_>) -> Vec<TagDetection> {
        let bits = self.matcher.dictionary().marker_size;
        let Some(mut decoder) = CellDecoder::new(self.params.decode.clone(), bits) else {
            log::warn!("decoder cannot sample {bits}x{bits} tags with current settings");
            return Vec::new();
        };

        let threshold = image_threshold(img);
        let components = dark_components(img, threshold);
        log::trace!(
            "threshold {threshold}, {} dark components",
            components.len()
        );

        let mut out = Vec::new();
        for comp in &components {
            if comp.touches_border(img.width, img.height) {
                continue;
            }
            let Some(quad) = fit_quad(comp, &self.params.quad) else {
                continue;
            };
            let Some(obs) = decoder.decode_quad(img, &quad) else {
                continue;
            };
            let Some(m) = self.matcher.match_code(obs.code) else {
                continue;
            };

            let r = m.rotation as usize;
            let corners = std::array::from_fn(|k| quad[(k + r) % 4]);
            let bit_count = self.matcher.dictionary().bit_count().max(1) as f32;
            let score = (obs.border_score * (1.0 - m.hamming as f32 / bit_count)).clamp(0.0, 1.0);

            out.push(TagDetection {
                id: m.id,
                hamming: m.hamming,
                rotation: m.rotation,
                center: diagonal_intersection(&corners),
                corners,
                score,
            });
        }
        out
    }
}

impl MarkerDetector for TagDetector {
    fn detect(&self, img: &GrayImage) -> Vec<TagDetection> {
        self.detect_view(&img.view())
    }
}

/// Where the quad's diagonals cross; the corner mean if they are parallel.
fn diagonal_intersection(c: &[Point2<f32>; 4]) -> Point2<f32> {
    let (p, r) = (c[0], c[2] - c[0]);
    let (q, s) = (c[1], c[3] - c[1]);
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-6 {
        let sum = c.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        return Point2::from(sum / 4.0);
    }
    let qp = q - p;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    p + r * t
}
