//! Live AprilTag bearing and pose reporting.
//!
//! A capture thread keeps the newest camera frame in a single-slot
//! [`FrameBuffer`]; the main loop ([`Session`]) takes whatever is newest,
//! runs the [`DetectionPipeline`] on it and rewrites the bearing file.
//! Frames that arrive while a pass is running are dropped.
//!
//! ```no_run
//! use tagwatch::{run, AppConfig};
//!
//! let config = AppConfig {
//!     images: vec!["frame.png".into()],
//!     draw: false,
//!     frame_limit: Some(1),
//!     ..AppConfig::default()
//! };
//! let summary = run(config)?;
//! println!("{} frames", summary.frames_processed);
//! # Ok::<(), tagwatch::AppError>(())
//! ```

pub mod annotate;
pub mod app;
pub mod camera;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod display;
pub mod frame;
pub mod frame_buffer;
pub mod pipeline;
pub mod producer;
pub mod report;
pub mod resolver;
pub mod session;

pub use app::{load_detector, open_camera, run, AppConfig, AppError};
pub use camera::{Camera, CameraControls, CameraError, CaptureError, StillImageCamera};
pub use config::{CameraConfig, CameraNumber, ConfigError, RigEntry};
pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use pipeline::{DetectionPipeline, FrameReport, PipelineOptions};
pub use producer::{FrameProducer, ProducerError};
pub use report::{BearingWriter, PoseReport};
pub use resolver::{DeviceResolver, ResolveError, SysfsLookup, VideoDeviceLookup};
pub use session::{CancellationToken, Session, SessionError, SessionState, SessionSummary};
