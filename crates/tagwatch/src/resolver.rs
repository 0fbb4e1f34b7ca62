//! USB topology path → `/dev/video<N>` index.

use crate::config::{CameraNumber, ConfigError, RigEntry};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to run `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Did not find video number for USB location `{usb_path}`, check USB location in config file")]
    NotFound { usb_path: String },
    #[error("bad device pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Finds the video device attached at a USB topology path.
pub trait VideoDeviceLookup {
    fn resolve_device_index(&self, usb_path: &str) -> Result<u32, ResolveError>;
}

/// Walks sysfs with `find` and picks the first `video<N>` node.
#[derive(Clone, Debug)]
pub struct SysfsLookup {
    root: PathBuf,
}

impl Default for SysfsLookup {
    fn default() -> Self {
        Self::new("/sys/bus/usb/devices")
    }
}

impl SysfsLookup {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VideoDeviceLookup for SysfsLookup {
    fn resolve_device_index(&self, usb_path: &str) -> Result<u32, ResolveError> {
        let target = self.root.join(usb_path.trim_start_matches('/'));
        let output = Command::new("find")
            .arg(&target)
            .output()
            .map_err(|source| ResolveError::Command {
                command: format!("find {}", target.display()),
                source,
            })?;
        if !output.status.success() {
            log::debug!(
                "find {} exited with {}: {}",
                target.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_video_index(&stdout)?.ok_or_else(|| ResolveError::NotFound {
            usb_path: usb_path.to_string(),
        })
    }
}

/// Index of the first line ending in `video<N>`.
pub fn parse_video_index(listing: &str) -> Result<Option<u32>, ResolveError> {
    let re = Regex::new(r"(?m)video([0-9]+)$")?;
    let found = re
        .captures_iter(listing)
        .find_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()));
    Ok(found)
}

/// A rig entry together with the device it resolved to.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCamera {
    pub entry: RigEntry,
    pub device_index: u32,
}

/// Reads the rig file and resolves the camera's device index.
pub struct DeviceResolver<L> {
    lookup: L,
}

impl<L: VideoDeviceLookup> DeviceResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn resolve(
        &self,
        config_path: &Path,
        camera: CameraNumber,
    ) -> Result<ResolvedCamera, ResolveError> {
        let entry = RigEntry::read(config_path, camera)?;
        let device_index = self.lookup.resolve_device_index(&entry.usb_path)?;
        log::info!(
            "{} camera at USB {} is /dev/video{device_index}",
            entry.name,
            entry.usb_path
        );
        Ok(ResolvedCamera {
            entry,
            device_index,
        })
    }
}
