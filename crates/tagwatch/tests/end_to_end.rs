mod common;

use common::{square_detection, CameraCounters, FakeDetector, ScriptedCamera};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tagwatch::annotate::Annotator;
use tagwatch::{
    CameraConfig, CameraNumber, CancellationToken, DetectionPipeline, DeviceResolver,
    FrameBuffer, FrameProducer, PipelineOptions, ResolveError, RigEntry, Session,
    VideoDeviceLookup,
};
use tagwatch_core::CameraModel;

struct OnlyPath(&'static str, u32);

impl VideoDeviceLookup for OnlyPath {
    fn resolve_device_index(&self, usb_path: &str) -> Result<u32, ResolveError> {
        if usb_path == self.0 {
            Ok(self.1)
        } else {
            Err(ResolveError::NotFound {
                usb_path: usb_path.to_string(),
            })
        }
    }
}

#[test]
fn rig_line_becomes_camera_config() {
    let entry: RigEntry = "Front /usb/1/2 out.txt 640 480 78.0".parse().expect("entry");
    let mut cfg = CameraConfig::default();
    cfg.apply_rig_entry(&entry, 4);
    assert_eq!(cfg.display_name(), "Front");
    assert_eq!(cfg.device_index, 4);
    assert_eq!((cfg.width, cfg.height), (640, 480));
    assert_eq!(cfg.fov_deg, 78.0);
    assert_eq!(cfg.output, Some(PathBuf::from("out.txt")));
}

#[test]
fn marker_right_of_centre_is_reported_with_positive_angle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("out.txt");
    let rig = dir.path().join("rig.txt");
    std::fs::write(&rig, format!("Front /usb/1/2 {} 640 480 78.0\n", out.display()))
        .expect("rig");

    let resolved = DeviceResolver::new(OnlyPath("/usb/1/2", 0))
        .resolve(&rig, CameraNumber::Front)
        .expect("resolve");
    let mut config = CameraConfig {
        model: CameraModel::ideal(640, 480),
        ..CameraConfig::default()
    };
    config.apply_rig_entry(&resolved.entry, resolved.device_index);

    let counters = CameraCounters::default();
    let camera = ScriptedCamera::new(Duration::from_millis(1), counters.clone()).sized(640, 480);
    let producer = FrameProducer::new(Box::new(camera), Arc::new(FrameBuffer::new()));
    let pipeline = DetectionPipeline::new(
        Box::new(FakeDetector::new(vec![square_detection(7, 420.0, 240.0, 30.0)])),
        config,
        PipelineOptions::default(),
        Annotator::new("Front", None),
    );
    let summary = Session::new(producer, pipeline, None, CancellationToken::new(), Some(1))
        .run()
        .expect("run");
    assert_eq!(summary.frames_processed, 1);

    let text = std::fs::read_to_string(&out).expect("output");
    assert_eq!(text, "11.0145 7\n");
}
