//! Startup wiring: resolve the camera, load the dictionary, open the device,
//! build the pipeline and run a session.

use crate::annotate::{AnnotateError, Annotator};
use crate::camera::{Camera, CameraError, StillImageCamera};
use crate::config::{CameraConfig, CameraNumber, ConfigError};
use crate::display::open_window;
use crate::frame_buffer::FrameBuffer;
use crate::pipeline::{DetectionPipeline, PipelineOptions};
use crate::producer::FrameProducer;
use crate::resolver::{DeviceResolver, ResolveError, SysfsLookup, VideoDeviceLookup};
use crate::session::{CancellationToken, Session, SessionError, SessionSummary};
use std::path::PathBuf;
use std::sync::Arc;
use tagwatch_aruco::{Dictionary, DictionaryError, TagDetector, TagDetectorParams, TagFamily};
use thiserror::Error;

/// Any error that ends the program during startup or shutdown.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("a rig file needs a camera number")]
    MissingCameraNumber,
}

/// Fully parsed settings for one run.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub camera_number: Option<CameraNumber>,
    /// Rig file; its entry overrides device, resolution, FOV, name and output.
    pub rig_file: Option<PathBuf>,
    pub family: TagFamily,
    /// Read `tag<family>.json` from here instead of the built-in table.
    pub dictionary_dir: Option<PathBuf>,
    pub max_hamming: u8,
    /// Replay these files instead of opening a device.
    pub images: Vec<PathBuf>,
    pub draw: bool,
    pub timing: bool,
    pub font: Option<PathBuf>,
    pub frame_limit: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            camera_number: None,
            rig_file: None,
            family: TagFamily::Tag36h11,
            dictionary_dir: None,
            max_hamming: TagDetectorParams::default().max_hamming,
            images: Vec::new(),
            draw: true,
            timing: false,
            font: None,
            frame_limit: None,
        }
    }
}

impl AppConfig {
    /// Fill the camera settings from the rig file, if one was given.
    pub fn apply_rig<L: VideoDeviceLookup>(
        &mut self,
        resolver: &DeviceResolver<L>,
    ) -> Result<(), AppError> {
        let Some(path) = &self.rig_file else {
            return Ok(());
        };
        let number = self.camera_number.ok_or(AppError::MissingCameraNumber)?;
        let resolved = resolver.resolve(path, number)?;
        self.camera
            .apply_rig_entry(&resolved.entry, resolved.device_index);
        Ok(())
    }

    fn check_controls(&self) -> Result<(), AppError> {
        if cfg!(feature = "v4l") || self.camera.controls.is_empty() {
            Ok(())
        } else {
            Err(CameraError::ControlsUnavailable.into())
        }
    }
}

/// Open the frame source the configuration asks for.
pub fn open_camera(config: &AppConfig) -> Result<Box<dyn Camera>, CameraError> {
    let cam = &config.camera;
    if !config.images.is_empty() {
        return Ok(Box::new(StillImageCamera::open(
            &config.images,
            cam.width,
            cam.height,
        )?));
    }
    #[cfg(feature = "v4l")]
    {
        let camera = crate::camera::V4lCamera::open(
            cam.device_index,
            cam.width,
            cam.height,
            &cam.controls,
        )?;
        Ok(Box::new(camera))
    }
    #[cfg(not(feature = "v4l"))]
    {
        Err(CameraError::NoBackend)
    }
}

/// Build a detector for the configured family.
pub fn load_detector(config: &AppConfig) -> Result<TagDetector, AppError> {
    let dict = match &config.dictionary_dir {
        Some(dir) => Dictionary::load(dir, config.family)?,
        None => Dictionary::builtin(config.family)?,
    };
    log::info!(
        "loaded {} ({} codes, {} correctable bits)",
        dict.name,
        dict.codes.len(),
        dict.max_correction_bits
    );
    let params = TagDetectorParams {
        max_hamming: config.max_hamming,
        ..TagDetectorParams::default()
    };
    Ok(TagDetector::new(dict, params))
}

/// Run until a signal, the quit key or the frame limit.
pub fn run(mut config: AppConfig) -> Result<SessionSummary, AppError> {
    config.check_controls()?;
    config.apply_rig(&DeviceResolver::new(SysfsLookup::default()))?;
    log::info!("{}", config.camera);

    let detector = load_detector(&config)?;
    let font = config
        .font
        .as_deref()
        .map(Annotator::load_font)
        .transpose()?;
    let name = config.camera.display_name().to_string();
    let annotator = Annotator::new(name.clone(), font);

    let camera = open_camera(&config)?;
    let producer = FrameProducer::new(camera, Arc::new(FrameBuffer::new()));

    let display = if config.draw {
        open_window(&name, config.camera.width, config.camera.height)
    } else {
        None
    };
    let options = PipelineOptions {
        timing: config.timing,
        draw: display.is_some(),
    };
    let pipeline = DetectionPipeline::new(Box::new(detector), config.camera, options, annotator);

    let token = CancellationToken::new();
    token.register_signals()?;
    let summary = Session::new(producer, pipeline, display, token, config.frame_limit).run()?;
    log::info!(
        "processed {} frames ({} captured, {} skipped)",
        summary.frames_processed,
        summary.frames_captured,
        summary.frames_skipped
    );
    Ok(summary)
}
