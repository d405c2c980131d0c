//! Device session boundary.
//!
//! A depth camera exposes three independent output channels:
//! - colour frames (RGB, at the configured colour resolution)
//! - depth frames (millimetres, aligned to the colour camera)
//! - spatial detection batches
//!
//! Each channel is filled asynchronously by the device and read here with
//! non-blocking polls. A poll that finds nothing new returns `Ok(None)`; that is
//! the common case on every tick and not an error.
//!
//! Built-in sessions:
//! - `stub://...` opens a [`SyntheticDevice`] that renders a moving test scene
//! - [`ScriptedDevice`] replays frames pushed by the caller (tests, replays)
//!
//! Other URL schemes name a hardware pipeline, which is not part of this crate.

mod mailbox;
mod scripted;
mod synthetic;

pub use mailbox::Mailbox;
pub use scripted::ScriptedDevice;
pub use synthetic::SyntheticDevice;

use serde::Serialize;

use crate::config::{Config, Resolution};
use crate::detect::Detection;
use crate::error::{Error, Result};
use crate::frame::{ColorFrame, DepthFrame};

/// Depth is produced at the mono camera's native 400P resolution.
pub const DEPTH_RESOLUTION: Resolution = Resolution {
    width: 640,
    height: 400,
};

/// Spatial range the detection network reports, in millimetres.
pub const DEPTH_LOWER_MM: f32 = 100.0;
pub const DEPTH_UPPER_MM: f32 = 5000.0;

/// What the device reports about itself.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub usb_speed: String,
    pub connected_cameras: Vec<String>,
    pub stereo_pairs: Vec<(String, String)>,
}

/// Which channels to start and how to size them.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSpec {
    pub color_resolution: Resolution,
    pub fps: u32,
    pub depth: bool,
    pub detections: bool,
    pub confidence_threshold: f32,
}

impl PipelineSpec {
    /// Colour plus aligned depth at the camera resolution.
    pub fn recording(config: &Config) -> Self {
        Self {
            color_resolution: config.camera.rgb_resolution,
            fps: config.camera.fps,
            depth: true,
            detections: false,
            confidence_threshold: config.detection.confidence_threshold,
        }
    }

    /// Network-sized colour preview plus spatial detections.
    pub fn detection(config: &Config) -> Self {
        Self {
            color_resolution: config.detection.preview_size,
            fps: config.camera.fps,
            depth: false,
            detections: true,
            confidence_threshold: config.detection.confidence_threshold,
        }
    }

    /// Colour and depth, for the live viewer.
    pub fn preview(config: &Config) -> Self {
        Self::recording(config)
    }

    /// No streams; enough to query device information.
    pub fn probe(config: &Config) -> Self {
        Self {
            depth: false,
            ..Self::recording(config)
        }
    }
}

/// One open connection to a depth camera.
///
/// All `try_*` calls must return immediately.
pub trait DeviceSession: Send {
    fn info(&self) -> DeviceInfo;

    fn try_color(&mut self) -> Result<Option<ColorFrame>>;

    fn try_depth(&mut self) -> Result<Option<DepthFrame>>;

    fn try_detections(&mut self) -> Result<Option<Vec<Detection>>>;

    /// Release the device. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Open the device named by `url` with the channels described by `spec`.
pub fn open(url: &str, spec: &PipelineSpec) -> Result<Box<dyn DeviceSession>> {
    if url.starts_with("stub://") {
        let device = SyntheticDevice::start(url, spec)?;
        return Ok(Box::new(device));
    }
    Err(Error::device(format!(
        "no device backend for '{url}': only stub:// devices are built in"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_spec_uses_preview_size() -> Result<()> {
        let config = Config::defaults()?;
        let spec = PipelineSpec::detection(&config);
        assert_eq!(spec.color_resolution, Resolution::new(304, 304));
        assert!(spec.detections);
        assert!(!spec.depth);
        Ok(())
    }

    #[test]
    fn unknown_scheme_is_rejected() -> Result<()> {
        let config = Config::defaults()?;
        let err = open("usb://1.2", &PipelineSpec::probe(&config)).err();
        assert!(matches!(err, Some(Error::Device(_))));
        Ok(())
    }
}
