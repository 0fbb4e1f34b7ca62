//! AprilTag-style fiducial detection.
//!
//! - built-in 16h5 and 36h11 code tables, plus JSON tables loaded at run time,
//! - a rotation-aware code matcher,
//! - a small detector: global threshold, dark components, quad fit, bit
//!   sampling.
//!
//! [`MarkerDetector`] is the seam the rest of tagwatch depends on;
//! [`TagDetector`] is the implementation shipped here.

mod decode;
mod detector;
mod dictionary;
mod matcher;
mod quad;
mod threshold;

pub use decode::{CellDecoder, DecodeConfig, Observation};
pub use detector::{MarkerDetector, TagDetection, TagDetector, TagDetectorParams};
pub use dictionary::{BitOrder, Dictionary, DictionaryError, TagFamily};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use quad::QuadParams;
pub use threshold::image_threshold;
