//! Dark connected components and quad fitting.
//!
//! The binary image is never materialised: each row is turned into runs of
//! pixels below the threshold, runs that overlap a run on the previous row
//! are merged with a union-find, and every component keeps its runs. The run
//! endpoints are the only points the quad fit looks at.

use nalgebra::{Point2, Vector2};
use tagwatch_core::GrayImageView;

#[derive(Clone, Copy, Debug)]
struct Run {
    y: u32,
    x0: u32,
    /// Inclusive.
    x1: u32,
}

impl Run {
    #[inline]
    fn len(&self) -> u32 {
        self.x1 - self.x0 + 1
    }
}

struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: u32) -> u32 {
        let mut root = i;
        while self.parent[root as usize] != root {
            self.parent[root as usize] = self.parent[self.parent[root as usize] as usize];
            root = self.parent[root as usize];
        }
        root
    }

    fn union(&mut self, i: u32, j: u32) {
        let (ri, rj) = (self.find(i), self.find(j));
        if ri == rj {
            return;
        }
        match self.rank[ri as usize].cmp(&self.rank[rj as usize]) {
            std::cmp::Ordering::Less => self.parent[ri as usize] = rj,
            std::cmp::Ordering::Greater => self.parent[rj as usize] = ri,
            std::cmp::Ordering::Equal => {
                self.parent[ri as usize] = rj;
                self.rank[rj as usize] += 1;
            }
        }
    }
}

/// One 4-connected region of dark pixels.
#[derive(Clone, Debug)]
pub(crate) struct Component {
    runs: Vec<Run>,
    pub pixel_count: usize,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl Component {
    fn new() -> Self {
        Self {
            runs: Vec::new(),
            pixel_count: 0,
            min_x: u32::MAX,
            max_x: 0,
            min_y: u32::MAX,
            max_y: 0,
        }
    }

    fn push(&mut self, r: Run) {
        self.pixel_count += r.len() as usize;
        self.min_x = self.min_x.min(r.x0);
        self.max_x = self.max_x.max(r.x1);
        self.min_y = self.min_y.min(r.y);
        self.max_y = self.max_y.max(r.y);
        self.runs.push(r);
    }

    /// Whether any pixel lies on the outermost image row or column.
    pub fn touches_border(&self, width: usize, height: usize) -> bool {
        self.min_x == 0
            || self.min_y == 0
            || self.max_x as usize + 1 >= width
            || self.max_y as usize + 1 >= height
    }

    fn centroid(&self) -> Point2<f64> {
        let (mut sx, mut sy) = (0.0, 0.0);
        for r in &self.runs {
            let n = r.len() as f64;
            sx += (r.x0 + r.x1) as f64 * 0.5 * n;
            sy += r.y as f64 * n;
        }
        let n = self.pixel_count.max(1) as f64;
        Point2::new(sx / n, sy / n)
    }

    fn endpoints(&self) -> impl Iterator<Item = Point2<f64>> + '_ {
        self.runs.iter().flat_map(|r| {
            [
                Point2::new(r.x0 as f64, r.y as f64),
                Point2::new(r.x1 as f64, r.y as f64),
            ]
        })
    }
}

/// Label pixels `< threshold`. Components come out in raster order of their
/// first pixel.
pub(crate) fn dark_components(img: &GrayImageView<'_>, threshold: u8) -> Vec<Component> {
    let mut runs: Vec<Run> = Vec::new();
    // index range of runs on each row
    let mut row_start = Vec::with_capacity(img.height + 1);

    for y in 0..img.height {
        row_start.push(runs.len());
        let row = &img.data[y * img.width..(y + 1) * img.width];
        let mut x = 0;
        while x < img.width {
            if row[x] >= threshold {
                x += 1;
                continue;
            }
            let x0 = x;
            while x < img.width && row[x] < threshold {
                x += 1;
            }
            runs.push(Run {
                y: y as u32,
                x0: x0 as u32,
                x1: (x - 1) as u32,
            });
        }
    }
    row_start.push(runs.len());

    let mut uf = UnionFind::new(runs.len());
    for y in 1..img.height {
        let (mut i, prev_end) = (row_start[y - 1], row_start[y]);
        let (mut j, cur_end) = (row_start[y], row_start[y + 1]);
        while i < prev_end && j < cur_end {
            let (p, c) = (runs[i], runs[j]);
            if p.x0 <= c.x1 && c.x0 <= p.x1 {
                uf.union(i as u32, j as u32);
            }
            if p.x1 < c.x1 {
                i += 1;
            } else {
                j += 1;
            }
        }
    }

    let mut slot = vec![u32::MAX; runs.len()];
    let mut out: Vec<Component> = Vec::new();
    for (idx, run) in runs.iter().enumerate() {
        let root = uf.find(idx as u32) as usize;
        if slot[root] == u32::MAX {
            slot[root] = out.len() as u32;
            out.push(Component::new());
        }
        out[slot[root] as usize].push(*run);
    }
    out
}

/// Geometric gates for turning a component into a quad.
#[derive(Clone, Debug)]
pub struct QuadParams {
    /// Smallest component worth fitting.
    pub min_pixels: usize,
    /// Shortest acceptable quad side, in pixels.
    pub min_side_px: f32,
    /// Pixel count must be at least this fraction of the quad area.
    pub min_fill: f32,
    /// Pixel count may exceed the quad area by at most this factor.
    pub max_fill: f32,
    /// Outward shift applied to each corner, from pixel centres to edges.
    pub corner_nudge_px: f32,
}

impl Default for QuadParams {
    fn default() -> Self {
        Self {
            min_pixels: 24,
            min_side_px: 10.0,
            min_fill: 0.25,
            max_fill: 1.05,
            corner_nudge_px: 0.7,
        }
    }
}

/// Fit four corners to a component, ordered clockwise on screen.
pub(crate) fn fit_quad(comp: &Component, params: &QuadParams) -> Option<[Point2<f32>; 4]> {
    if comp.pixel_count < params.min_pixels {
        return None;
    }
    let centroid = comp.centroid();

    let farthest = |from: Point2<f64>| {
        comp.endpoints().max_by(|a, b| {
            (a - from)
                .norm_squared()
                .total_cmp(&(b - from).norm_squared())
        })
    };
    let c0 = farthest(centroid)?;
    let c2 = farthest(c0)?;
    let diag = c2 - c0;
    if diag.norm() < params.min_side_px as f64 {
        return None;
    }

    let side_of = |p: &Point2<f64>| cross(diag, p - c0);
    let c1 = comp
        .endpoints()
        .max_by(|a, b| side_of(a).total_cmp(&side_of(b)))?;
    let c3 = comp
        .endpoints()
        .min_by(|a, b| side_of(a).total_cmp(&side_of(b)))?;
    if side_of(&c1) <= 0.0 || side_of(&c3) >= 0.0 {
        return None;
    }

    let mut corners = [c0, c1, c2, c3];
    let center = Point2::from(corners.iter().map(|p| p.coords).sum::<Vector2<f64>>() / 4.0);
    corners.sort_by(|a, b| {
        let ta = (a.y - center.y).atan2(a.x - center.x);
        let tb = (b.y - center.y).atan2(b.x - center.x);
        ta.total_cmp(&tb)
    });

    let nudge = params.corner_nudge_px as f64;
    let corners = corners.map(|p| {
        let d = p - center;
        let n = d.norm();
        let q = if n > 1e-9 { p + d * (nudge / n) } else { p };
        Point2::new(q.x as f32, q.y as f32)
    });

    for k in 0..4 {
        let side = (corners[(k + 1) % 4] - corners[k]).norm();
        if side < params.min_side_px {
            return None;
        }
    }

    let area = quad_area(&corners);
    let pixels = comp.pixel_count as f32;
    if area <= 0.0 || pixels < params.min_fill * area || pixels > params.max_fill * area {
        return None;
    }
    Some(corners)
}

#[inline]
fn cross(a: Vector2<f64>, b: Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Shoelace area; positive for clockwise-on-screen order.
fn quad_area(c: &[Point2<f32>; 4]) -> f32 {
    let mut s = 0.0;
    for k in 0..4 {
        let (a, b) = (c[k], c[(k + 1) % 4]);
        s += a.x * b.y - b.x * a.y;
    }
    0.5 * s
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagwatch_core::GrayImage;

    fn rect_image(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> GrayImage {
        let mut img = GrayImage::filled(w, h, 255);
        for y in y0..=y1 {
            for x in x0..=x1 {
                img.data[y * w + x] = 0;
            }
        }
        img
    }

    #[test]
    fn u_shape_is_one_component() {
        // two columns joined at the bottom
        let mut img = GrayImage::filled(10, 6, 255);
        for y in 1..5 {
            img.data[y * 10 + 2] = 0;
            img.data[y * 10 + 7] = 0;
        }
        for x in 2..=7 {
            img.data[4 * 10 + x] = 0;
        }
        let comps = dark_components(&img.view(), 128);
        assert_eq!(comps.len(), 1);
        assert_eq!(comps[0].pixel_count, 4 + 4 + 4);
    }

    #[test]
    fn diagonal_neighbours_stay_separate() {
        let mut img = GrayImage::filled(4, 4, 255);
        img.data[5] = 0; // (1,1)
        img.data[10] = 0; // (2,2)
        let comps = dark_components(&img.view(), 128);
        assert_eq!(comps.len(), 2);
        assert_eq!((comps[0].min_x, comps[0].min_y), (1, 1));
    }

    #[test]
    fn filled_square_fits_its_outline() {
        let img = rect_image(60, 50, 10, 12, 39, 41);
        let comps = dark_components(&img.view(), 128);
        assert_eq!(comps.len(), 1);
        assert!(!comps[0].touches_border(60, 50));

        let q = fit_quad(&comps[0], &QuadParams::default()).expect("quad");
        let expect = [(9.5, 11.5), (39.5, 11.5), (39.5, 41.5), (9.5, 41.5)];
        for (c, e) in q.iter().zip(expect) {
            assert!((c.x - e.0).abs() < 0.1 && (c.y - e.1).abs() < 0.1, "{c:?} vs {e:?}");
        }
    }

    #[test]
    fn thin_line_is_rejected() {
        let img = rect_image(60, 20, 5, 9, 54, 10);
        let comps = dark_components(&img.view(), 128);
        assert!(fit_quad(&comps[0], &QuadParams::default()).is_none());
    }

    #[test]
    fn component_on_edge_is_flagged() {
        let img = rect_image(30, 30, 0, 5, 12, 20);
        let comps = dark_components(&img.view(), 128);
        assert!(comps[0].touches_border(30, 30));
    }
}
