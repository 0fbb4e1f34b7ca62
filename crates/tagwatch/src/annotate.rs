//! Drawing detections and the camera label onto frames.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_text_mut,
    text_size,
};
use std::path::{Path, PathBuf};
use tagwatch_aruco::TagDetection;
use thiserror::Error;

const TOP_EDGE: Rgb<u8> = Rgb([255, 0, 0]);
const EDGE: Rgb<u8> = Rgb([0, 255, 0]);
const CENTRE: Rgb<u8> = Rgb([255, 0, 255]);
const LABEL: Rgb<u8> = Rgb([255, 255, 255]);

/// DejaVu Sans Mono, used when no font is given. See `assets/` for its licence.
static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("failed to read font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a usable font")]
    InvalidFont { path: PathBuf },
}

/// Outline a detection: the tag's top edge in red, the rest in green, and
/// a marker on the centre.
pub fn draw_detection(img: &mut RgbImage, det: &TagDetection) {
    for k in 0..4 {
        let a = det.corners[k];
        let b = det.corners[(k + 1) % 4];
        let colour = if k == 0 { TOP_EDGE } else { EDGE };
        draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), colour);
    }
    let c = (det.center.x.round() as i32, det.center.y.round() as i32);
    draw_hollow_circle_mut(img, c, 6, CENTRE);
    draw_filled_circle_mut(img, c, 2, CENTRE);
}

/// Draws detections, their ids and the camera label.
pub struct Annotator {
    label: String,
    font: Option<FontArc>,
}

impl Annotator {
    /// `None` selects the bundled font.
    pub fn new(label: impl Into<String>, font: Option<FontArc>) -> Self {
        let font = font.or_else(|| match FontArc::try_from_slice(DEFAULT_FONT) {
            Ok(f) => Some(f),
            Err(e) => {
                log::warn!("bundled font unusable ({e}), labels disabled");
                None
            }
        });
        Self {
            label: label.into(),
            font,
        }
    }

    /// Load a TrueType/OpenType font for the labels.
    pub fn load_font(path: &Path) -> Result<FontArc, AnnotateError> {
        let bytes = std::fs::read(path).map_err(|source| AnnotateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        FontArc::try_from_vec(bytes).map_err(|_| AnnotateError::InvalidFont {
            path: path.to_path_buf(),
        })
    }

    pub fn annotate(&self, img: &mut RgbImage, detections: &[TagDetection]) {
        for det in detections {
            draw_detection(img, det);
            if let Some(font) = &self.font {
                let (x, y) = (det.center.x as i32 + 8, det.center.y as i32 - 8);
                draw_text_mut(img, CENTRE, x, y, PxScale::from(18.0), font, &det.id.to_string());
            }
        }
        if let Some(font) = &self.font {
            // bottom-left, like a caption
            let scale = PxScale::from(44.0);
            let (_, h) = text_size(scale, font, &self.label);
            let y = img.height() as i32 - h as i32 - 4;
            draw_text_mut(img, LABEL, 4, y, scale, font, &self.label);
        }
    }
}
