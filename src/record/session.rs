use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

use super::{check_frame_size, EncoderFactory, EncoderRole, EncoderSpec, VideoEncoder};
use crate::error::{Error, Result};

/// File written and removed to prove the output directory is writable.
pub const WRITE_PROBE_NAME: &str = ".write_test";

/// One output stream a run wants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderTarget {
    pub role: EncoderRole,
    pub path: PathBuf,
}

impl EncoderTarget {
    pub fn new(role: EncoderRole, path: impl Into<PathBuf>) -> Self {
        Self {
            role,
            path: path.into(),
        }
    }
}

/// Owns every encoder of one run.
///
/// Encoders are opened together on the first frame, once its size is known.
/// If any of them fails to open, the ones already opened are closed again
/// before the error is returned. The first target is the primary stream: each
/// successful write to it counts one frame.
pub struct RecordingSession {
    targets: Vec<EncoderTarget>,
    fps: u32,
    factory: Box<dyn EncoderFactory>,
    encoders: Vec<(EncoderRole, Box<dyn VideoEncoder>)>,
    frame_count: u64,
}

impl RecordingSession {
    /// Create the output directory and verify it is writable. No encoder is
    /// opened yet.
    pub fn prepare(
        output_dir: &Path,
        targets: Vec<EncoderTarget>,
        fps: u32,
        factory: Box<dyn EncoderFactory>,
    ) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::invalid_config("recording needs at least one output stream"));
        }
        ensure_writable(output_dir)?;
        Ok(Self {
            targets,
            fps,
            factory,
            encoders: Vec::new(),
            frame_count: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.encoders.is_empty()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn targets(&self) -> &[EncoderTarget] {
        &self.targets
    }

    pub fn primary_role(&self) -> Option<EncoderRole> {
        self.targets.first().map(|t| t.role)
    }

    /// Open every encoder at `width`x`height` unless already open.
    pub fn ensure_open(&mut self, width: u32, height: u32) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        let mut opened: Vec<(EncoderRole, Box<dyn VideoEncoder>)> = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let spec = EncoderSpec {
                role: target.role,
                path: target.path.clone(),
                fps: self.fps,
                width,
                height,
            };
            match self.factory.open(&spec) {
                Ok(encoder) => {
                    log::info!(
                        "opened {} encoder {} ({}x{} @ {} fps)",
                        target.role,
                        target.path.display(),
                        width,
                        height,
                        self.fps
                    );
                    opened.push((target.role, encoder));
                }
                Err(err) => {
                    log::error!("failed to open {} encoder: {}", target.role, err);
                    release_all(&mut opened);
                    return Err(err);
                }
            }
        }
        self.encoders = opened;
        Ok(())
    }

    /// Write one frame to the encoder for `role`.
    pub fn write(&mut self, role: EncoderRole, frame: &RgbImage) -> Result<()> {
        let primary = self.primary_role();
        let Some((_, encoder)) = self.encoders.iter_mut().find(|(r, _)| *r == role) else {
            return Err(Error::EncoderWrite {
                role,
                reason: "encoder is not open".to_string(),
            });
        };
        check_frame_size(role, encoder.frame_size(), frame)?;
        encoder.write(frame)?;
        if primary == Some(role) {
            self.frame_count += 1;
        }
        Ok(())
    }

    /// Close every open encoder, newest first. Safe to call any number of
    /// times; the first failure is reported after all encoders were tried.
    pub fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some((role, mut encoder)) = self.encoders.pop() {
            match encoder.close() {
                Ok(()) => log::info!("closed {} encoder {}", role, encoder.path().display()),
                Err(err) => {
                    log::error!("failed to close {} encoder: {}", role, err);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.is_open() {
            let _ = self.close();
        }
    }
}

fn release_all(opened: &mut Vec<(EncoderRole, Box<dyn VideoEncoder>)>) {
    while let Some((role, mut encoder)) = opened.pop() {
        if let Err(err) = encoder.close() {
            log::warn!("failed to release {} encoder during rollback: {}", role, err);
        }
    }
}

fn ensure_writable(dir: &Path) -> Result<()> {
    let not_writable = |source| Error::OutputNotWritable {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(not_writable)?;
    let probe = dir.join(WRITE_PROBE_NAME);
    fs::write(&probe, b"").map_err(not_writable)?;
    fs::remove_file(&probe).map_err(not_writable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DefaultEncoderFactory;
    use image::Rgb;

    fn targets(dir: &Path) -> Vec<EncoderTarget> {
        vec![
            EncoderTarget::new(EncoderRole::Color, dir.join("rgb.y4m")),
            EncoderTarget::new(EncoderRole::Depth, dir.join("depth.y4m")),
        ]
    }

    #[test]
    fn prepare_creates_nested_directory_without_probe() -> Result<()> {
        let root = tempfile::tempdir()?;
        let out = root.path().join("a").join("b");
        let session = RecordingSession::prepare(&out, targets(&out), 30, Box::new(DefaultEncoderFactory))?;
        assert!(out.is_dir());
        assert!(!out.join(WRITE_PROBE_NAME).exists());
        assert!(!session.is_open());
        assert!(!out.join("rgb.y4m").exists());
        Ok(())
    }

    #[test]
    fn prepare_fails_when_path_is_a_file() -> Result<()> {
        let root = tempfile::tempdir()?;
        let blocker = root.path().join("blocker");
        fs::write(&blocker, b"x")?;
        let err = RecordingSession::prepare(&blocker, targets(&blocker), 30, Box::new(DefaultEncoderFactory)).err();
        assert!(matches!(err, Some(Error::OutputNotWritable { .. })));
        Ok(())
    }

    #[test]
    fn counts_primary_writes_only() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut session = RecordingSession::prepare(root.path(), targets(root.path()), 30, Box::new(DefaultEncoderFactory))?;
        session.ensure_open(4, 4)?;
        session.ensure_open(8, 8)?;
        let frame = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        session.write(EncoderRole::Color, &frame)?;
        session.write(EncoderRole::Depth, &frame)?;
        session.write(EncoderRole::Depth, &frame)?;
        assert_eq!(session.frame_count(), 1);
        session.close()?;
        session.close()?;
        assert!(!session.is_open());
        Ok(())
    }

    #[test]
    fn write_before_open_is_an_error() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut session = RecordingSession::prepare(root.path(), targets(root.path()), 30, Box::new(DefaultEncoderFactory))?;
        let err = session.write(EncoderRole::Color, &RgbImage::new(4, 4)).err();
        assert!(matches!(err, Some(Error::EncoderWrite { .. })));
        assert_eq!(session.frame_count(), 0);
        Ok(())
    }

    #[test]
    fn mismatched_frame_is_rejected() -> Result<()> {
        let root = tempfile::tempdir()?;
        let mut session = RecordingSession::prepare(root.path(), targets(root.path()), 30, Box::new(DefaultEncoderFactory))?;
        session.ensure_open(4, 4)?;
        let err = session.write(EncoderRole::Color, &RgbImage::new(5, 4)).err();
        assert!(matches!(err, Some(Error::FrameSizeMismatch { .. })));
        assert_eq!(session.frame_count(), 0);
        Ok(())
    }
}
