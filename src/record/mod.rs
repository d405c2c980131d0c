//! Video recording.
//!
//! - `VideoEncoder`: one open output file accepting fixed-size RGB frames
//! - `EncoderFactory`: opens encoders; the default one picks a writer from the
//!   file extension
//! - `RecordingSession`: lazily opens every encoder a run needs, all or
//!   nothing, and counts frames written on the primary stream
//!
//! `.y4m` output is always available. `.mp4`, `.avi` and `.mkv` go through
//! FFmpeg and need the `encode-ffmpeg` feature.

#[cfg(feature = "encode-ffmpeg")]
mod mpeg4;
mod session;
mod y4m;

pub use session::{EncoderTarget, RecordingSession, WRITE_PROBE_NAME};
pub use y4m::Y4mEncoder;

use image::RgbImage;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncoderRole {
    Color,
    Depth,
    Annotated,
}

impl fmt::Display for EncoderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Color => "color",
            Self::Depth => "depth",
            Self::Annotated => "annotated",
        };
        f.write_str(name)
    }
}

/// Everything needed to open one output stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderSpec {
    pub role: EncoderRole,
    pub path: PathBuf,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

pub trait VideoEncoder {
    fn path(&self) -> &Path;

    fn frame_size(&self) -> (u32, u32);

    fn write(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and release the output. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

pub trait EncoderFactory {
    fn open(&self, spec: &EncoderSpec) -> Result<Box<dyn VideoEncoder>>;
}

/// Chooses the writer from the output file extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultEncoderFactory;

impl EncoderFactory for DefaultEncoderFactory {
    fn open(&self, spec: &EncoderSpec) -> Result<Box<dyn VideoEncoder>> {
        let extension = spec
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "y4m" => Ok(Box::new(Y4mEncoder::create(spec)?)),
            "mp4" | "avi" | "mkv" => open_ffmpeg(spec),
            other => Err(Error::encoder_open(
                spec.role,
                &spec.path,
                format!("unsupported container '.{other}'"),
            )),
        }
    }
}

#[cfg(feature = "encode-ffmpeg")]
fn open_ffmpeg(spec: &EncoderSpec) -> Result<Box<dyn VideoEncoder>> {
    Ok(Box::new(mpeg4::FfmpegEncoder::create(spec)?))
}

#[cfg(not(feature = "encode-ffmpeg"))]
fn open_ffmpeg(spec: &EncoderSpec) -> Result<Box<dyn VideoEncoder>> {
    Err(Error::encoder_open(
        spec.role,
        &spec.path,
        "this container requires the encode-ffmpeg feature",
    ))
}

pub(crate) fn check_frame_size(role: EncoderRole, expected: (u32, u32), frame: &RgbImage) -> Result<()> {
    let actual = frame.dimensions();
    if actual != expected {
        return Err(Error::FrameSizeMismatch {
            role,
            expected,
            actual,
        });
    }
    Ok(())
}
