//! YUV4MPEG2 writer.
//!
//! Uncompressed 4:4:4 planar output that any FFmpeg-based player can read:
//! a single stream header line, then `FRAME\n` followed by the Y, Cb and Cr
//! planes for each frame. Colour conversion is BT.601, studio range.

use image::RgbImage;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{check_frame_size, EncoderRole, EncoderSpec, VideoEncoder};
use crate::error::{Error, Result};

pub struct Y4mEncoder {
    role: EncoderRole,
    path: PathBuf,
    width: u32,
    height: u32,
    writer: Option<BufWriter<File>>,
    planes: Vec<u8>,
}

impl Y4mEncoder {
    pub fn create(spec: &EncoderSpec) -> Result<Self> {
        if spec.width == 0 || spec.height == 0 || spec.fps == 0 {
            return Err(Error::encoder_open(
                spec.role,
                &spec.path,
                format!("invalid stream {}x{} @ {} fps", spec.width, spec.height, spec.fps),
            ));
        }
        let file = File::create(&spec.path)
            .map_err(|e| Error::encoder_open(spec.role, &spec.path, e.to_string()))?;
        let mut writer = BufWriter::new(file);
        writeln!(
            writer,
            "YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C444",
            spec.width, spec.height, spec.fps
        )
        .map_err(|e| Error::encoder_open(spec.role, &spec.path, e.to_string()))?;

        Ok(Self {
            role: spec.role,
            path: spec.path.clone(),
            width: spec.width,
            height: spec.height,
            writer: Some(writer),
            planes: vec![0; (spec.width * spec.height * 3) as usize],
        })
    }

    fn write_error(&self, reason: impl ToString) -> Error {
        Error::EncoderWrite {
            role: self.role,
            reason: reason.to_string(),
        }
    }
}

impl VideoEncoder for Y4mEncoder {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        check_frame_size(self.role, (self.width, self.height), frame)?;
        let plane = (self.width * self.height) as usize;
        let (y_plane, rest) = self.planes.split_at_mut(plane);
        let (u_plane, v_plane) = rest.split_at_mut(plane);
        for (i, px) in frame.pixels().enumerate() {
            let (y, u, v) = rgb_to_ycbcr(px.0);
            y_plane[i] = y;
            u_plane[i] = u;
            v_plane[i] = v;
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(self.write_error("encoder already closed"));
        };
        let result = writer
            .write_all(b"FRAME\n")
            .and_then(|_| writer.write_all(&self.planes));
        result.map_err(|e| self.write_error(e))
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush().map_err(|e| self.write_error(e))?;
        log::debug!("closed {} encoder {}", self.role, self.path.display());
        Ok(())
    }
}

impl Drop for Y4mEncoder {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn rgb_to_ycbcr([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
    let u = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
    let v = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
    (y.clamp(0, 255) as u8, u.clamp(0, 255) as u8, v.clamp(0, 255) as u8)
}
