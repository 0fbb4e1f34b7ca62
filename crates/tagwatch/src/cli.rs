//! Command-line interface.

use crate::app::{AppConfig, AppError};
use crate::camera::CameraControls;
use crate::config::{load_camera_model, CameraNumber};
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;
use tagwatch_aruco::TagFamily;

#[derive(Debug, Parser)]
#[command(name = "tagwatch")]
#[command(about = "Detect AprilTags on a USB camera and report their bearing and pose")]
#[command(version, disable_help_flag = true)]
pub struct Cli {
    /// Print help.
    #[arg(short = 'h', short_alias = '?', long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Disable graphics.
    #[arg(short = 'd', long = "no-draw")]
    pub no_draw: bool,

    /// Log how long detection takes.
    #[arg(short = 't', long)]
    pub timing: bool,

    /// Tag family: 16h5, 25h7, 25h9, 36h9 or 36h11.
    #[arg(short = 'C', long = "family", default_value = "36h11")]
    pub family: String,

    /// Video device number, /dev/video<N>.
    #[arg(short = 'D', long = "device")]
    pub device: Option<u32>,

    /// Focal length in pixels, used for both axes.
    #[arg(short = 'F', long = "focal")]
    pub focal: Option<f64>,

    /// Image width.
    #[arg(short = 'W', long)]
    pub width: Option<u32>,

    /// Image height.
    #[arg(short = 'H', long)]
    pub height: Option<u32>,

    /// Tag size (black square side) in metres.
    #[arg(short = 'S', long = "tag-size")]
    pub tag_size: Option<f64>,

    /// Manual exposure, 0..=10000.
    #[arg(short = 'E', long, value_parser = clap::value_parser!(i32).range(0..=10000))]
    pub exposure: Option<i32>,

    /// Gain, 0..=255.
    #[arg(short = 'G', long, value_parser = clap::value_parser!(i32).range(0..=255))]
    pub gain: Option<i32>,

    /// Brightness, 0..=255.
    #[arg(short = 'B', long, value_parser = clap::value_parser!(i32).range(0..=255))]
    pub brightness: Option<i32>,

    /// Camera number: 1 (front) or 2 (back).
    #[arg(short = 'N', long = "camera")]
    pub camera: Option<u8>,

    /// Rig file; needs -N to pick the line.
    #[arg(short = 'n', long = "rig", requires = "camera")]
    pub rig: Option<PathBuf>,

    /// Replay these images instead of opening a camera.
    pub images: Vec<PathBuf>,

    /// Read tag<family>.json from this directory instead of the built-in table.
    #[arg(long)]
    pub dictionary_dir: Option<PathBuf>,

    /// Largest number of corrected bits accepted.
    #[arg(long, default_value_t = 2)]
    pub max_hamming: u8,

    /// JSON camera model (intrinsics and distortion) used for undistortion.
    #[arg(long)]
    pub camera_model: Option<PathBuf>,

    /// Bearing output file.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// TrueType font for labels instead of the bundled one.
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Stop after this many processed frames.
    #[arg(long)]
    pub frames: Option<u64>,

    /// More logging; repeat for trace.
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log level; overrides -v.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Emit JSON logs.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Cli {
    /// Detection reports are logged at info, so that is the floor.
    pub fn log_level(&self) -> LevelFilter {
        self.log_level.map(LevelFilter::from).unwrap_or(match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
    }

    pub fn into_app_config(self) -> Result<AppConfig, AppError> {
        let family: TagFamily = self.family.parse()?;
        let camera_number = self.camera.map(CameraNumber::try_from).transpose()?;

        let mut cfg = AppConfig {
            family,
            camera_number,
            rig_file: self.rig,
            dictionary_dir: self.dictionary_dir,
            max_hamming: self.max_hamming,
            images: self.images,
            draw: !self.no_draw,
            timing: self.timing,
            font: self.font,
            frame_limit: self.frames,
            ..AppConfig::default()
        };

        let cam = &mut cfg.camera;
        if let Some(path) = &self.camera_model {
            cam.model = load_camera_model(path)?;
        }
        if let Some(n) = camera_number {
            cam.name = Some(n.name().to_string());
        }
        if let Some(d) = self.device {
            cam.device_index = d;
        }
        if let Some(f) = self.focal {
            cam.fx = f;
            cam.fy = f;
        }
        if let Some(w) = self.width {
            cam.width = w;
        }
        if let Some(h) = self.height {
            cam.height = h;
        }
        if let Some(s) = self.tag_size {
            cam.tag_size = s;
        }
        cam.output = self.output;
        cam.controls = CameraControls {
            exposure: self.exposure,
            gain: self.gain,
            brightness: self.brightness,
        };
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagwatch_aruco::DictionaryError;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tagwatch").chain(args.iter().copied()))
            .expect("parse")
    }

    #[test]
    fn short_flags_fill_the_camera_config() {
        let cfg = parse(&["-d", "-t", "-C", "16h5", "-F", "700", "-W", "800", "-H", "600", "-S", "0.1", "-D", "3"])
            .into_app_config()
            .expect("config");
        assert!(!cfg.draw);
        assert!(cfg.timing);
        assert_eq!(cfg.family, TagFamily::Tag16h5);
        assert_eq!((cfg.camera.fx, cfg.camera.fy), (700.0, 700.0));
        assert_eq!((cfg.camera.width, cfg.camera.height), (800, 600));
        assert_eq!(cfg.camera.tag_size, 0.1);
        assert_eq!(cfg.camera.device_index, 3);
        let k = cfg.camera.pose_intrinsics();
        assert_eq!((k.cx, k.cy), (400.0, 300.0));
    }

    #[test]
    fn camera_number_names_the_camera() {
        let cfg = parse(&["-N", "2"]).into_app_config().expect("config");
        assert_eq!(cfg.camera_number, Some(CameraNumber::Back));
        assert_eq!(cfg.camera.display_name(), "Back");
    }

    #[test]
    fn rig_file_requires_camera_number() {
        let err = Cli::try_parse_from(["tagwatch", "-n", "rig.txt"]).expect_err("needs -N");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            parse(&["-C", "36h10"]).into_app_config(),
            Err(AppError::Dictionary(DictionaryError::UnknownFamily(_)))
        ));
        assert!(parse(&["-N", "3"]).into_app_config().is_err());
        assert!(Cli::try_parse_from(["tagwatch", "-G", "300"]).is_err());
    }

    #[test]
    fn question_mark_is_help() {
        let err = Cli::try_parse_from(["tagwatch", "-?"]).expect_err("help");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(parse(&[]).log_level(), LevelFilter::Info);
        assert_eq!(parse(&["-vv"]).log_level(), LevelFilter::Trace);
        assert_eq!(parse(&["-v", "--log-level", "warn"]).log_level(), LevelFilter::Warn);
    }
}
