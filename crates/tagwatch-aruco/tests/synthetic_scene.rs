use approx::assert_relative_eq;
use nalgebra::{Matrix3, Point2, Rotation3, Vector3};
use tagwatch_aruco::{Dictionary, MarkerDetector, TagDetector, TagDetectorParams, TagFamily};
use tagwatch_core::{homography_from_4pt, GrayImage};

const CODES: [u64; 4] = [0xd73cf256d, 0xd8f4d3e27, 0xcec99108d, 0x77734d7c1];
const FX: f64 = 600.0;
const CX: f64 = 320.0;
const CY: f64 = 240.0;
const TAG_SIZE: f64 = 0.166;

fn load_dictionary() -> Dictionary {
    let dir = tempfile::tempdir().expect("tempdir");
    let codes: Vec<String> = CODES.iter().map(|c| format!("{c:#x}")).collect();
    let json = serde_json_text(&codes);
    std::fs::write(TagFamily::Tag36h11.file_in(dir.path()), json).expect("write dictionary");
    Dictionary::load(dir.path(), TagFamily::Tag36h11).expect("load dictionary")
}

fn serde_json_text(codes: &[String]) -> String {
    let quoted: Vec<String> = codes.iter().map(|c| format!("\"{c}\"")).collect();
    format!(
        r#"{{"name":"tag36h11-test","marker_size":6,"max_correction_bits":3,"codes":[{}]}}"#,
        quoted.join(",")
    )
}

/// Image corners of the tag's black square, tag order.
fn project_corners(rot: &Matrix3<f64>, t: &Vector3<f64>) -> [Point2<f32>; 4] {
    let h = TAG_SIZE / 2.0;
    [(-h, -h), (h, -h), (h, h), (-h, h)].map(|(x, y)| {
        let c = rot * Vector3::new(x, y, 0.0) + t;
        Point2::new((FX * c.x / c.z + CX) as f32, (FX * c.y / c.z + CY) as f32)
    })
}

/// Render tag `code` (6x6 bits plus a one-cell border) seen through `corners`.
fn render(code: u64, corners: &[Point2<f32>; 4]) -> GrayImage {
    let cells = 8.0f32;
    let square = [
        Point2::new(0.0, 0.0),
        Point2::new(cells, 0.0),
        Point2::new(cells, cells),
        Point2::new(0.0, cells),
    ];
    let to_tag = homography_from_4pt(&square, corners)
        .and_then(|h| h.inverse())
        .expect("invertible");

    let mut img = GrayImage::filled(640, 480, 230);
    for y in 0..480 {
        for x in 0..640 {
            let p = to_tag.apply(Point2::new(x as f32, y as f32));
            if !(0.0..cells).contains(&p.x) || !(0.0..cells).contains(&p.y) {
                continue;
            }
            let (cx, cy) = (p.x as usize, p.y as usize);
            let border = cx == 0 || cy == 0 || cx == 7 || cy == 7;
            let black = border || (code >> ((cy - 1) * 6 + (cx - 1))) & 1 == 1;
            img.data[y * 640 + x] = if black { 20 } else { 230 };
        }
    }
    img
}

fn detector() -> TagDetector {
    TagDetector::new(
        load_dictionary(),
        TagDetectorParams {
            max_hamming: 1,
            ..TagDetectorParams::default()
        },
    )
}

#[test]
fn detects_tilted_tag_and_recovers_pose() {
    let rot = Rotation3::from_euler_angles(0.25, -0.35, 0.3).into_inner();
    let t = Vector3::new(0.05, -0.02, 0.8);
    let truth = project_corners(&rot, &t);
    let img = render(CODES[2], &truth);

    let found = detector().detect(&img);
    assert_eq!(found.len(), 1, "{found:?}");
    let d = &found[0];
    assert_eq!(d.id, 2);
    assert_eq!(d.hamming, 0);
    for (c, e) in d.corners.iter().zip(truth.iter()) {
        assert!((c - e).norm() < 2.0, "corner {c:?} vs {e:?}");
    }

    let pose = d.relative_pose(TAG_SIZE, FX, FX, CX, CY).expect("pose");
    assert_relative_eq!(pose.distance(), t.norm(), max_relative = 0.05);
    // forward, left, up
    assert_relative_eq!(pose.translation.x, t.z, max_relative = 0.05);
    assert!(pose.translation.y < 0.0);
    assert!(pose.translation.z > 0.0);
}

#[test]
fn upside_down_tag_keeps_tag_corner_order() {
    let rot = Rotation3::from_euler_angles(0.1, 0.15, std::f64::consts::PI + 0.2).into_inner();
    let t = Vector3::new(-0.1, 0.05, 1.0);
    let truth = project_corners(&rot, &t);
    let img = render(CODES[0], &truth);

    let found = detector().detect(&img);
    assert_eq!(found.len(), 1, "{found:?}");
    let d = &found[0];
    assert_eq!(d.id, 0);
    assert_eq!(d.rotation, 2);
    for (c, e) in d.corners.iter().zip(truth.iter()) {
        assert!((c - e).norm() < 2.0, "corner {c:?} vs {e:?}");
    }
}

#[test]
fn empty_scene_has_no_detections() {
    let img = GrayImage::filled(320, 240, 128);
    assert!(detector().detect(&img).is_empty());
}

#[test]
fn builtin_table_decodes_a_rendered_tag() {
    let dict = Dictionary::builtin(TagFamily::Tag36h11).expect("builtin 36h11");
    let code = dict.codes[42];
    let detector = TagDetector::new(dict, TagDetectorParams::default());

    let rot = Rotation3::from_euler_angles(-0.2, 0.1, 0.05).into_inner();
    let t = Vector3::new(0.0, 0.03, 0.9);
    let img = render(code, &project_corners(&rot, &t));

    let found = detector.detect(&img);
    assert_eq!(found.len(), 1, "{found:?}");
    assert_eq!((found[0].id, found[0].hamming), (42, 0));
}
