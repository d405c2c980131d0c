//! Error types for the depth camera recorder.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::record::EncoderRole;

/// Result type alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("invalid config file {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown colormap '{0}'")]
    UnknownColormap(String),

    #[error("no permission to create/write output directory {}: {source}", path.display())]
    OutputNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {role} encoder at {}: {reason}", path.display())]
    EncoderOpen {
        role: EncoderRole,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to write {role} frame: {reason}")]
    EncoderWrite { role: EncoderRole, reason: String },

    #[error("{role} encoder expects {}x{} frames, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    FrameSizeMismatch {
        role: EncoderRole,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("no colour frame received within {waited:?}")]
    NoFrameReceived { waited: Duration },

    #[error("device error: {0}")]
    Device(String),

    #[error("display error: {0}")]
    Display(String),

    #[error("failed to install interrupt handler: {0}")]
    InterruptHandler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::Device(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn encoder_open<S: Into<String>>(role: EncoderRole, path: impl Into<PathBuf>, reason: S) -> Self {
        Self::EncoderOpen {
            role,
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Configuration failures abort before any resource is acquired.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidConfig(_)
                | Self::UnknownColormap(_)
        )
    }
}
