//! Console report lines and the bearing file.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tagwatch_aruco::TagDetection;
use tagwatch_core::{format_g6, PoseEuler, RelativePose};

/// Horizontal field of view in degrees from the diagonal one.
pub fn horizontal_fov_deg(diagonal_fov_deg: f64, width: u32, height: u32) -> f64 {
    let diag = diagonal_fov_deg.to_radians();
    let aspect = (width as f64).atan2(height as f64);
    (diag.tan() * aspect.cos()).atan().to_degrees()
}

/// Bearing of an image column relative to the integer image centre,
/// positive to the right.
pub fn horizontal_angle_deg(x: f64, width: u32, horizontal_fov_deg: f64) -> f64 {
    let centre = (width / 2) as f64;
    (x - centre) * (horizontal_fov_deg / width as f64)
}

/// Pose of one detection as printed on the console.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseReport {
    pub id: u32,
    pub hamming: u8,
    pub distance: f64,
    /// Forward, left, up; metres.
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub euler: PoseEuler,
}

impl PoseReport {
    pub fn new(det: &TagDetection, pose: &RelativePose) -> Self {
        Self {
            id: det.id,
            hamming: det.hamming,
            distance: pose.distance(),
            x: pose.translation.x,
            y: pose.translation.y,
            z: pose.translation.z,
            euler: PoseEuler::from_camera_rotation(&pose.rotation),
        }
    }
}

impl fmt::Display for PoseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id: {} (Hamming: {}) distance={}m, x={}, y={}, z={}, {}",
            self.id,
            self.hamming,
            format_g6(self.distance),
            format_g6(self.x),
            format_g6(self.y),
            format_g6(self.z),
            self.euler
        )
    }
}

/// Rewrites the bearing file with `<degrees> <id>` lines.
///
/// Angles use the size of the frame the detections came from, which may
/// differ from the requested capture size.
#[derive(Clone, Debug)]
pub struct BearingWriter {
    path: PathBuf,
    diagonal_fov_deg: f64,
}

impl BearingWriter {
    pub fn new(path: impl Into<PathBuf>, diagonal_fov_deg: f64) -> Self {
        Self {
            path: path.into(),
            diagonal_fov_deg,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents for `detections` found in a `width`x`height` frame,
    /// in detection order.
    pub fn render(&self, detections: &[TagDetection], width: u32, height: u32) -> String {
        let fov_h = horizontal_fov_deg(self.diagonal_fov_deg, width, height);
        let mut out = String::new();
        for d in detections {
            let angle = horizontal_angle_deg(d.center.x as f64, width, fov_h);
            out.push_str(&format!("{} {}\n", format_g6(angle), d.id));
        }
        out
    }

    /// Truncate and rewrite the file. No detections leaves it empty.
    pub fn write(&self, detections: &[TagDetection], width: u32, height: u32) -> io::Result<()> {
        std::fs::write(&self.path, self.render(detections, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Point2, Vector3};

    fn det_at(id: u32, x: f32) -> TagDetection {
        TagDetection {
            id,
            hamming: 0,
            rotation: 0,
            center: Point2::new(x, 240.0),
            corners: [Point2::new(x, 240.0); 4],
            score: 1.0,
        }
    }

    #[test]
    fn horizontal_fov_of_the_default_camera() {
        assert_relative_eq!(horizontal_fov_deg(78.0, 640, 480), 70.4928, epsilon = 1e-3);
    }

    #[test]
    fn centre_column_has_zero_bearing() {
        let fov = horizontal_fov_deg(78.0, 640, 480);
        assert_eq!(horizontal_angle_deg(320.0, 640, fov), 0.0);
        assert!(horizontal_angle_deg(100.0, 640, fov) < 0.0);
        // odd widths use the integer centre
        assert_eq!(horizontal_angle_deg(320.0, 641, fov), 0.0);
    }

    #[test]
    fn renders_one_line_per_detection() {
        let w = BearingWriter::new("unused", 78.0);
        let text = w.render(&[det_at(7, 420.0), det_at(3, 320.0)], 640, 480);
        assert_eq!(text, "11.0145 7\n0 3\n");
        assert_eq!(w.render(&[], 640, 480), "");
    }

    #[test]
    fn bearing_uses_the_delivered_frame_size() {
        let w = BearingWriter::new("unused", 78.0);
        // a driver that hands back 320x240 moves the centre to column 160
        assert_eq!(w.render(&[det_at(5, 160.0)], 320, 240), "0 5\n");
        let fov = horizontal_fov_deg(78.0, 320, 240);
        let expected = format!("{} 5\n", format_g6((210.0 - 160.0) * fov / 320.0));
        assert_eq!(w.render(&[det_at(5, 210.0)], 320, 240), expected);
    }

    #[test]
    fn write_truncates_previous_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let w = BearingWriter::new(&path, 78.0);
        w.write(&[det_at(1, 100.0), det_at(2, 200.0)], 640, 480).expect("write");
        w.write(&[], 640, 480).expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "");
    }

    #[test]
    fn report_line_format() {
        let pose = RelativePose {
            translation: Vector3::new(1.0, 0.5, -0.25),
            rotation: Matrix3::identity(),
        };
        let r = PoseReport::new(&det_at(4, 0.0), &pose);
        let line = r.to_string();
        // a tag facing the camera reads as a half-turn of roll, always +π
        assert_eq!(
            line,
            "Id: 4 (Hamming: 0) distance=1.14564m, x=1, y=0.5, z=-0.25, yaw=0, pitch=0, roll=3.14159"
        );
    }
}
