//! Camera configuration: the rig file and the resolved per-camera settings.
//!
//! The rig file has one line per camera, front first:
//!
//! ```text
//! Front 1-1.2 front.txt 640 480 78.0
//! Back  1-1.3 back.txt  640 480 78.0
//! ```
//!
//! Fields are the display name, the USB topology path under
//! `/sys/bus/usb/devices`, the bearing output file, width, height and the
//! diagonal field of view in degrees.

use crate::camera::CameraControls;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tagwatch_core::{CameraIntrinsics, CameraModel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} has no line {line}")]
    MissingLine { path: PathBuf, line: usize },
    #[error("expected 6 fields (name usb_path output width height fov), found {0}")]
    FieldCount(usize),
    #[error("invalid {field} `{value}`")]
    Field { field: &'static str, value: String },
    #[error("camera number must be 1 (front) or 2 (back), got {0}")]
    CameraNumber(u8),
    #[error("failed to parse camera model {path}: {source}")]
    CameraModel {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which rig position this process serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraNumber {
    Front = 1,
    Back = 2,
}

impl CameraNumber {
    pub fn name(self) -> &'static str {
        match self {
            CameraNumber::Front => "Front",
            CameraNumber::Back => "Back",
        }
    }

    /// Zero-based line in the rig file.
    pub fn line_index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for CameraNumber {
    type Error = ConfigError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            1 => Ok(CameraNumber::Front),
            2 => Ok(CameraNumber::Back),
            other => Err(ConfigError::CameraNumber(other)),
        }
    }
}

/// One line of the rig file.
#[derive(Clone, Debug, PartialEq)]
pub struct RigEntry {
    pub name: String,
    pub usb_path: String,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fov_deg: f64,
}

impl FromStr for RigEntry {
    type Err = ConfigError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [name, usb_path, output, width, height, fov] = fields[..] else {
            return Err(ConfigError::FieldCount(fields.len()));
        };
        Ok(Self {
            name: name.to_string(),
            usb_path: usb_path.to_string(),
            output: PathBuf::from(output),
            width: parse_field("width", width)?,
            height: parse_field("height", height)?,
            fov_deg: parse_field("fov", fov)?,
        })
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Field {
        field,
        value: value.to_string(),
    })
}

impl RigEntry {
    /// Read the entry for `camera` from the rig file at `path`.
    pub fn read(path: &Path, camera: CameraNumber) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let line = text
            .lines()
            .nth(camera.line_index())
            .ok_or_else(|| ConfigError::MissingLine {
                path: path.to_path_buf(),
                line: camera.line_index() + 1,
            })?;
        line.parse()
    }
}

/// Everything needed to open and interpret one camera. Fixed after startup.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    /// Lens model used for undistortion.
    pub model: CameraModel,
    /// Focal lengths used for pose recovery; the principal point is always
    /// the image centre.
    pub fx: f64,
    pub fy: f64,
    /// Side of the black tag square, metres.
    pub tag_size: f64,
    /// Diagonal field of view, degrees.
    pub fov_deg: f64,
    /// Bearing file rewritten every frame.
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub controls: CameraControls,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            model: CameraModel::default(),
            fx: 600.0,
            fy: 600.0,
            tag_size: 0.166,
            fov_deg: 78.0,
            output: None,
            name: None,
            controls: CameraControls::default(),
        }
    }
}

impl CameraConfig {
    /// Take name, output, resolution and FOV from a rig entry.
    pub fn apply_rig_entry(&mut self, entry: &RigEntry, device_index: u32) {
        self.device_index = device_index;
        self.name = Some(entry.name.clone());
        self.output = Some(entry.output.clone());
        self.width = entry.width;
        self.height = entry.height;
        self.fov_deg = entry.fov_deg;
    }

    /// Intrinsics for pose recovery: `fx`, `fy` and the integer image centre.
    pub fn pose_intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::new(
            self.fx,
            self.fy,
            (self.width / 2) as f64,
            (self.height / 2) as f64,
        )
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("camera")
    }
}

impl fmt::Display for CameraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (/dev/video{}, {}x{}, fov {}°, tag {} m)",
            self.display_name(),
            self.device_index,
            self.width,
            self.height,
            self.fov_deg,
            self.tag_size
        )
    }
}

/// Read a JSON camera model (intrinsics + distortion).
pub fn load_camera_model(path: &Path) -> Result<CameraModel, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::CameraModel {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_rig_line() {
        let e: RigEntry = "Front /usb/1/2 out.txt 640 480 78.0".parse().expect("entry");
        assert_eq!(
            e,
            RigEntry {
                name: "Front".into(),
                usb_path: "/usb/1/2".into(),
                output: PathBuf::from("out.txt"),
                width: 640,
                height: 480,
                fov_deg: 78.0,
            }
        );
    }

    #[test]
    fn rejects_short_and_malformed_lines() {
        assert!(matches!(
            "Front 1-1 out.txt 640 480".parse::<RigEntry>(),
            Err(ConfigError::FieldCount(5))
        ));
        assert!(matches!(
            "Front 1-1 out.txt wide 480 78".parse::<RigEntry>(),
            Err(ConfigError::Field { field: "width", .. })
        ));
    }

    #[test]
    fn back_camera_reads_second_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rig.txt");
        std::fs::write(&path, "Front 1-1.2 f.txt 640 480 78\nBack 1-1.3 b.txt 320 240 60\n")
            .expect("write");

        let back = RigEntry::read(&path, CameraNumber::Back).expect("back");
        assert_eq!(back.name, "Back");
        assert_eq!((back.width, back.height), (320, 240));

        std::fs::write(&path, "Front 1-1.2 f.txt 640 480 78\n").expect("write");
        assert!(matches!(
            RigEntry::read(&path, CameraNumber::Back),
            Err(ConfigError::MissingLine { line: 2, .. })
        ));
    }

    #[test]
    fn principal_point_follows_resolution() {
        let mut cfg = CameraConfig::default();
        let entry: RigEntry = "Back 1-1 b.txt 321 241 60".parse().expect("entry");
        cfg.apply_rig_entry(&entry, 3);
        let k = cfg.pose_intrinsics();
        assert_eq!((k.cx, k.cy), (160.0, 120.0));
        assert_eq!(cfg.device_index, 3);
        assert_eq!(cfg.display_name(), "Back");
    }

    #[test]
    fn camera_numbers_map_to_names() {
        assert_eq!(CameraNumber::try_from(1).expect("front").name(), "Front");
        assert_eq!(CameraNumber::try_from(2).expect("back").line_index(), 1);
        assert!(CameraNumber::try_from(3).is_err());
    }
}
