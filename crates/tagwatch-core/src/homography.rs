//! Projective maps between a tag's square and its image quad.
//!
//! Every quad here is a square seen in perspective, so the solver goes
//! through the unit square: `src → unit square → dst`, each leg in closed
//! form.

use nalgebra::{Matrix3, Point2, Vector3};

/// Planar projective transform, `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        Point2::new((v.x / v.z) as f32, (v.y / v.z) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Map taking the unit square `(0,0) (1,0) (1,1) (0,1)` onto `quad`, in that
/// order.
fn unit_square_to(quad: &[Point2<f32>; 4]) -> Option<Matrix3<f64>> {
    let [p0, p1, p2, p3] = quad.map(|p| (p.x as f64, p.y as f64));
    let sx = p0.0 - p1.0 + p2.0 - p3.0;
    let sy = p0.1 - p1.1 + p2.1 - p3.1;

    let (g, h) = if sx == 0.0 && sy == 0.0 {
        // parallelogram
        (0.0, 0.0)
    } else {
        let (dx1, dy1) = (p1.0 - p2.0, p1.1 - p2.1);
        let (dx2, dy2) = (p3.0 - p2.0, p3.1 - p2.1);
        let den = dx1 * dy2 - dx2 * dy1;
        if den.abs() < 1e-12 {
            return None;
        }
        ((sx * dy2 - dx2 * sy) / den, (dx1 * sy - sx * dy1) / den)
    };

    let m = Matrix3::new(
        p1.0 - p0.0 + g * p1.0,
        p3.0 - p0.0 + h * p3.0,
        p0.0,
        p1.1 - p0.1 + g * p1.1,
        p3.1 - p0.1 + h * p3.1,
        p0.1,
        g,
        h,
        1.0,
    );

    let scale = m.amax().max(1.0);
    (m.determinant().abs() > 1e-12 * scale * scale).then_some(m)
}

/// Homography with `dst[k] ~ H * src[k]` for the four corners.
///
/// Both quads must list corners in the same cyclic order. Returns `None`
/// when either quad is degenerate (three corners collinear).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    let to_dst = unit_square_to(dst)?;
    let from_src = unit_square_to(src)?.try_inverse()?;
    let h = to_dst * from_src;
    let w = h[(2, 2)];
    if w.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / w))
}
