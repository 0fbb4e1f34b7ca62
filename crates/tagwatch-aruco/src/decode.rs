//! Bit sampling inside a tag quad.

use crate::threshold::otsu_threshold_from_samples;
use tagwatch_core::{homography_from_4pt, GrayImageView, Homography};
use nalgebra::Point2;

/// Sampling configuration for a single tag.
#[derive(Clone, Debug)]
pub struct DecodeConfig {
    /// Border width in cells (AprilTag uses 1).
    pub border_bits: usize,
    /// Fraction of the tag side to ignore near the edges.
    pub inset_frac: f32,
    /// Reject observations whose border is less dark than this ratio.
    pub min_border_score: f32,
    /// Side of the virtual rectified square the sample grid is laid out on.
    pub px_per_square: f32,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            inset_frac: 0.0,
            min_border_score: 0.85,
            px_per_square: 100.0,
        }
    }
}

/// Raw bits read from one quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// Inner bits, row-major, black = 1, in the quad's own corner order.
    pub code: u64,
    /// Fraction of border cells read as black.
    pub border_score: f32,
    /// Whether polarity had to be flipped to find the border.
    pub inverted: bool,
}

const MIN_SIDE_PX: f32 = 12.0;
const THRESH_SUBDIV: usize = 3;
const MIN_CONTRAST: u8 = 20;

struct SampleGrid {
    cells: usize,
    points: Vec<Point2<f32>>, // row-major: cy * cells + cx
    threshold_points: Vec<Point2<f32>>,
}

impl SampleGrid {
    fn new(cfg: &DecodeConfig, bits: usize) -> Option<Self> {
        if bits == 0 || bits * bits > 64 {
            return None;
        }
        let cells = bits + 2 * cfg.border_bits;

        let s = cfg.px_per_square;
        let inset = (cfg.inset_frac * s).max(0.0);
        let side = s - 2.0 * inset;
        if side < MIN_SIDE_PX {
            return None;
        }

        let step = side / cells as f32;
        let points = (0..cells * cells)
            .map(|i| {
                let (cx, cy) = (i % cells, i / cells);
                Point2::new(
                    inset + (cx as f32 + 0.5) * step,
                    inset + (cy as f32 + 0.5) * step,
                )
            })
            .collect();

        let grid = cells * THRESH_SUBDIV;
        let tstep = side / grid as f32;
        let threshold_points = (0..grid * grid)
            .map(|i| {
                let (tx, ty) = (i % grid, i / grid);
                Point2::new(
                    inset + (tx as f32 + 0.5) * tstep,
                    inset + (ty as f32 + 0.5) * tstep,
                )
            })
            .collect();

        Some(Self {
            cells,
            points,
            threshold_points,
        })
    }
}

/// Reusable decoder for one marker size.
pub struct CellDecoder {
    cfg: DecodeConfig,
    bits: usize,
    square: [Point2<f32>; 4],
    grid: SampleGrid,
    scratch_bits: Vec<u8>,
    scratch_thr: Vec<u8>,
}

impl CellDecoder {
    /// `None` when the configuration cannot hold `bits × bits` cells.
    pub fn new(cfg: DecodeConfig, bits: usize) -> Option<Self> {
        let grid = SampleGrid::new(&cfg, bits)?;
        let s = cfg.px_per_square;
        Some(Self {
            bits,
            square: [
                Point2::new(0.0, 0.0),
                Point2::new(s, 0.0),
                Point2::new(s, s),
                Point2::new(0.0, s),
            ],
            scratch_bits: Vec::with_capacity(grid.points.len()),
            scratch_thr: Vec::with_capacity(grid.threshold_points.len()),
            grid,
            cfg,
        })
    }

    /// Read the bits inside `corners` (image pixels, clockwise on screen).
    pub fn decode_quad(
        &mut self,
        img: &GrayImageView<'_>,
        corners: &[Point2<f32>; 4],
    ) -> Option<Observation> {
        let h = homography_from_4pt(&self.square, corners)?;
        self.decode_warped(img, &h)
    }

    fn decode_warped(&mut self, img: &GrayImageView<'_>, h: &Homography) -> Option<Observation> {
        self.scratch_bits.clear();
        for p in &self.grid.points {
            let q = h.apply(*p);
            let v = sample_mean_3x3(img, q.x, q.y)?;
            self.scratch_bits.push(v);
        }

        self.scratch_thr.clear();
        for p in &self.grid.threshold_points {
            let q = h.apply(*p);
            if let Some(v) = sample_mean_3x3(img, q.x, q.y) {
                self.scratch_thr.push(v);
            }
        }

        decode_samples(
            &self.scratch_bits,
            &self.scratch_thr,
            self.grid.cells,
            self.bits,
            self.cfg.border_bits,
            self.cfg.min_border_score,
        )
    }
}

fn decode_samples(
    samples: &[u8],
    thr_samples: &[u8],
    cells: usize,
    bits: usize,
    border: usize,
    min_border_score: f32,
) -> Option<Observation> {
    if samples.len() != cells * cells {
        return None;
    }

    let thr_source = if thr_samples.is_empty() {
        samples
    } else {
        thr_samples
    };
    let lo = thr_source.iter().copied().min().unwrap_or(0);
    let hi = thr_source.iter().copied().max().unwrap_or(0);
    if hi.saturating_sub(lo) < MIN_CONTRAST {
        return None;
    }
    let thr = otsu_threshold_from_samples(thr_source);

    let mut best: Option<Observation> = None;
    for inverted in [false, true] {
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code = 0u64;

        for cy in 0..cells {
            for cx in 0..cells {
                let is_black = (samples[cy * cells + cx] < thr) != inverted;
                let is_border = cx < border
                    || cy < border
                    || cx >= cells - border
                    || cy >= cells - border;
                if is_border {
                    border_total += 1;
                    border_ok += is_black as u32;
                } else if is_black {
                    code |= 1u64 << ((cy - border) * bits + (cx - border));
                }
            }
        }

        let border_score = if border_total > 0 {
            border_ok as f32 / border_total as f32
        } else {
            1.0
        };
        if border_score < min_border_score {
            continue;
        }
        if best.is_none_or(|b| border_score > b.border_score) {
            best = Some(Observation {
                code,
                border_score,
                inverted,
            });
        }
    }

    best
}

/// 3×3 box mean around the pixel nearest to `(x, y)`; pixel centres sit on
/// integer coordinates. `None` when the window leaves the image.
fn sample_mean_3x3(img: &GrayImageView<'_>, x: f32, y: f32) -> Option<u8> {
    let ix = x.round() as i32;
    let iy = y.round() as i32;
    if ix < 1 || iy < 1 || ix + 1 >= img.width as i32 || iy + 1 >= img.height as i32 {
        return None;
    }

    let mut sum = 0u32;
    for yy in (iy - 1)..=(iy + 1) {
        let row = yy as usize * img.width;
        for xx in (ix - 1)..=(ix + 1) {
            sum += img.data[row + xx as usize] as u32;
        }
    }
    Some((sum / 9) as u8)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tagwatch_core::GrayImage;

    /// Axis-aligned marker with a one-cell white margin around the border.
    pub(crate) fn marker_image(code: u64, bits: usize, cell_px: usize) -> GrayImage {
        let cells = bits + 2;
        let side = (cells + 2) * cell_px;
        let mut img = GrayImage::filled(side, side, 255);
        for cy in 0..cells {
            for cx in 0..cells {
                let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
                let black = is_border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
                if !black {
                    continue;
                }
                for yy in 0..cell_px {
                    for xx in 0..cell_px {
                        let x = (cx + 1) * cell_px + xx;
                        let y = (cy + 1) * cell_px + yy;
                        img.data[y * side + x] = 0;
                    }
                }
            }
        }
        img
    }

    fn quad(cell_px: usize, bits: usize) -> [Point2<f32>; 4] {
        let lo = cell_px as f32 - 0.5;
        let hi = ((bits + 3) * cell_px) as f32 - 0.5;
        [
            Point2::new(lo, lo),
            Point2::new(hi, lo),
            Point2::new(hi, hi),
            Point2::new(lo, hi),
        ]
    }

    #[test]
    fn reads_bits_inside_an_axis_aligned_quad() {
        let code = 0x52e6;
        let img = marker_image(code, 4, 10);
        let mut dec = CellDecoder::new(DecodeConfig::default(), 4).expect("decoder");
        let obs = dec.decode_quad(&img.view(), &quad(10, 4)).expect("observation");
        assert_eq!(obs.code, code);
        assert!(!obs.inverted);
        assert!(obs.border_score > 0.99);
    }

    #[test]
    fn starting_corner_rotates_the_code() {
        let code = 0x269e;
        let img = marker_image(code, 4, 10);
        let q = quad(10, 4);
        // start from the top-right corner
        let turned = [q[1], q[2], q[3], q[0]];
        let mut dec = CellDecoder::new(DecodeConfig::default(), 4).expect("decoder");
        let obs = dec.decode_quad(&img.view(), &turned).expect("observation");
        assert_eq!(crate::rotate_code_u64(obs.code, 4, 1), code);
    }

    #[test]
    fn blank_quad_has_no_border() {
        let img = GrayImage::filled(80, 80, 255);
        let mut dec = CellDecoder::new(DecodeConfig::default(), 4).expect("decoder");
        assert!(dec.decode_quad(&img.view(), &quad(10, 4)).is_none());
    }

    #[test]
    fn tiny_virtual_square_is_rejected() {
        let cfg = DecodeConfig {
            px_per_square: 8.0,
            ..DecodeConfig::default()
        };
        assert!(CellDecoder::new(cfg, 6).is_none());
    }
}
