//! Display surfaces.
//!
//! The runners hand every preview frame to a [`DisplaySurface`] and ask it for
//! a pending key press once per tick; `q` ends the run. Two surfaces ship with
//! the crate:
//! - `HeadlessDisplay` discards frames (servers, CI, tests)
//! - `SnapshotDisplay` keeps the latest frame of each window as a PNG file
//!
//! Either can take key presses from the terminal through [`StdinKeys`].

use image::RgbImage;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crate::device::Mailbox;
use crate::error::{Error, Result};

pub const QUIT_KEY: char = 'q';

pub trait DisplaySurface {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<()>;

    /// Key pressed since the last call, if any. Never blocks.
    fn poll_key(&mut self) -> Option<char>;

    /// Tear down every window. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// First character of each line typed on stdin, read on a background thread.
///
/// The reader thread blocks on stdin and is left detached; it ends with the
/// process.
pub struct StdinKeys {
    keys: Mailbox<char>,
}

impl StdinKeys {
    pub fn spawn() -> Result<Self> {
        let keys = Mailbox::new();
        let producer = keys.clone();
        thread::Builder::new()
            .name("stdin-keys".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if let Some(key) = line.trim().chars().next() {
                        producer.post(key.to_ascii_lowercase());
                    }
                }
            })?;
        Ok(Self { keys })
    }

    pub fn poll(&self) -> Option<char> {
        self.keys.take()
    }
}

/// Surface with no output.
#[derive(Default)]
pub struct HeadlessDisplay {
    shown: u64,
    scripted_keys: VecDeque<(u64, char)>,
    stdin: Option<StdinKeys>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdin(mut self, keys: StdinKeys) -> Self {
        self.stdin = Some(keys);
        self
    }

    /// Report `key` once `after_frames` frames have been shown.
    pub fn press_after(mut self, after_frames: u64, key: char) -> Self {
        self.scripted_keys.push_back((after_frames, key));
        self
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn show(&mut self, _window: &str, _frame: &RgbImage) -> Result<()> {
        if self.closed {
            return Err(Error::Display("display already closed".to_string()));
        }
        self.shown += 1;
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        if let Some(&(after, key)) = self.scripted_keys.front() {
            if self.shown >= after {
                self.scripted_keys.pop_front();
                return Some(key);
            }
        }
        self.stdin.as_ref().and_then(StdinKeys::poll)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Writes the latest frame of each window to `<dir>/<window>.png`, every
/// `interval` frames per window.
pub struct SnapshotDisplay {
    dir: PathBuf,
    interval: u64,
    counts: Vec<(String, u64)>,
    stdin: Option<StdinKeys>,
    closed: bool,
}

impl SnapshotDisplay {
    pub fn create(dir: impl Into<PathBuf>, interval: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Display(format!("cannot create {}: {e}", dir.display())))?;
        log::info!("writing preview snapshots to {}", dir.display());
        Ok(Self {
            dir,
            interval: interval.max(1),
            counts: Vec::new(),
            stdin: None,
            closed: false,
        })
    }

    pub fn with_stdin(mut self, keys: StdinKeys) -> Self {
        self.stdin = Some(keys);
        self
    }

    pub fn snapshot_path(&self, window: &str) -> PathBuf {
        snapshot_path(&self.dir, window)
    }

    fn bump(&mut self, window: &str) -> u64 {
        match self.counts.iter_mut().find(|(name, _)| name == window) {
            Some((_, count)) => {
                *count += 1;
                *count
            }
            None => {
                self.counts.push((window.to_string(), 1));
                1
            }
        }
    }
}

impl DisplaySurface for SnapshotDisplay {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<()> {
        if self.closed {
            return Err(Error::Display("display already closed".to_string()));
        }
        let count = self.bump(window);
        if (count - 1) % self.interval != 0 {
            return Ok(());
        }
        let path = self.snapshot_path(window);
        frame
            .save(&path)
            .map_err(|e| Error::Display(format!("cannot write {}: {e}", path.display())))
    }

    fn poll_key(&mut self) -> Option<char> {
        self.stdin.as_ref().and_then(StdinKeys::poll)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            log::info!("closed {} preview window(s)", self.counts.len());
        }
        Ok(())
    }
}

fn snapshot_path(dir: &Path, window: &str) -> PathBuf {
    let name: String = window
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    dir.join(format!("{name}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_reports_scripted_key() -> Result<()> {
        let mut display = HeadlessDisplay::new().press_after(2, QUIT_KEY);
        let frame = RgbImage::new(2, 2);
        display.show("RGB", &frame)?;
        assert_eq!(display.poll_key(), None);
        display.show("RGB", &frame)?;
        assert_eq!(display.poll_key(), Some('q'));
        assert_eq!(display.poll_key(), None);
        Ok(())
    }

    #[test]
    fn headless_close_is_idempotent() -> Result<()> {
        let mut display = HeadlessDisplay::new();
        let closes = display.close_counter();
        display.close()?;
        display.close()?;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(display.show("RGB", &RgbImage::new(1, 1)).is_err());
        Ok(())
    }

    #[test]
    fn snapshots_follow_interval() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut display = SnapshotDisplay::create(dir.path(), 2)?;
        let path = display.snapshot_path("Object Detection");
        assert!(path.ends_with("object_detection.png"));

        display.show("Object Detection", &RgbImage::new(3, 3))?;
        assert!(path.exists());
        std::fs::remove_file(&path)?;
        display.show("Object Detection", &RgbImage::new(3, 3))?;
        assert!(!path.exists());
        display.show("Object Detection", &RgbImage::new(3, 3))?;
        assert!(path.exists());
        display.close()
    }
}
