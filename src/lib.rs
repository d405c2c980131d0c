//! depthcam - stereo depth camera recording and spatial detection overlay.
//!
//! This crate drives a depth camera that delivers three independent streams
//! (colour frames, depth frames, spatial detections) and turns them into
//! video files or a live annotated preview.
//!
//! # Architecture
//!
//! One thread runs every mode. Each tick:
//!
//! 1. **Poll**: the [`sync::StreamSynchronizer`] takes whatever each channel
//!    has, without waiting, and keeps the latest item per channel.
//! 2. **Render**: the [`overlay`] draws boxes, labels and the distance panel
//!    onto a copy of the colour frame; depth is colourised by [`render`].
//! 3. **Write**: the [`record::RecordingSession`] opens its encoders on the
//!    first frame (all or none) and writes one frame per stream.
//! 4. **Stop**: the [`shutdown::ShutdownController`] releases display,
//!    recording and device in that order, exactly once, however the loop
//!    ended.
//!
//! # Module Structure
//!
//! - `config`: default tree, deep merge, overrides, typed snapshot
//! - `device`: device session boundary, synthetic and scripted devices
//! - `frame`, `detect`: payload types
//! - `sync`, `overlay`, `record`, `shutdown`: the control core
//! - `render`, `display`: drawing and preview surfaces
//! - `app`: mode runners; `cli`: command line front end

pub mod app;
pub mod cli;
pub mod config;
pub mod detect;
pub mod device;
pub mod display;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod record;
pub mod render;
pub mod shutdown;
pub mod sync;
pub mod ui;

pub use config::{Config, ConfigSource, Mode, Overrides, Resolution};
pub use detect::{Detection, NormalizedBox, PixelBox, SpatialPoint};
pub use device::{DeviceInfo, DeviceSession, PipelineSpec, ScriptedDevice, SyntheticDevice};
pub use error::{Error, Result};
pub use frame::{ColorFrame, DepthFrame};
pub use overlay::{annotate, OverlayOptions};
pub use record::{DefaultEncoderFactory, EncoderFactory, EncoderRole, RecordingSession, VideoEncoder};
pub use render::Colormap;
pub use shutdown::{InterruptFlag, ShutdownController, ShutdownState, StopReason};
pub use sync::StreamSynchronizer;
