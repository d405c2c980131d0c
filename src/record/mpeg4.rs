//! FFmpeg-backed encoder (MPEG-4 Part 2 in whatever container the file
//! extension names).

use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::{Path, PathBuf};

use super::{check_frame_size, EncoderRole, EncoderSpec, VideoEncoder};
use crate::error::{Error, Result};

pub(crate) struct FfmpegEncoder {
    role: EncoderRole,
    path: PathBuf,
    width: u32,
    height: u32,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    next_pts: i64,
    finished: bool,
}

impl FfmpegEncoder {
    pub(crate) fn create(spec: &EncoderSpec) -> Result<Self> {
        let fail = |what: &str, e: ffmpeg::Error| {
            Error::encoder_open(spec.role, &spec.path, format!("{what}: {e}"))
        };
        ffmpeg::init().map_err(|e| fail("initialize ffmpeg", e))?;

        let mut output = ffmpeg::format::output(&spec.path).map_err(|e| fail("open output", e))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| Error::encoder_open(spec.role, &spec.path, "MPEG-4 encoder not available"))?;
        let mut stream = output.add_stream(codec).map_err(|e| fail("add stream", e))?;
        let stream_index = stream.index();

        let encoder_time_base = ffmpeg::Rational::new(1, spec.fps as i32);
        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| fail("create video encoder", e))?;
        video.set_width(spec.width);
        video.set_height(spec.height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(ffmpeg::Rational::new(spec.fps as i32, 1)));
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = video.open_as(codec).map_err(|e| fail("open encoder", e))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output.write_header().map_err(|e| fail("write header", e))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .unwrap_or(encoder_time_base);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::format::Pixel::RGB24,
            spec.width,
            spec.height,
            ffmpeg::format::Pixel::YUV420P,
            spec.width,
            spec.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| fail("create scaler", e))?;

        Ok(Self {
            role: spec.role,
            path: spec.path.clone(),
            width: spec.width,
            height: spec.height,
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            next_pts: 0,
            finished: false,
        })
    }

    fn write_error(&self, what: &str, e: ffmpeg::Error) -> Error {
        Error::EncoderWrite {
            role: self.role,
            reason: format!("{what}: {e}"),
        }
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .map_err(|e| self.write_error("write packet", e))?;
        }
        Ok(())
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn path(&self) -> &Path {
        &self.path
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(Error::EncoderWrite {
                role: self.role,
                reason: "encoder already closed".to_string(),
            });
        }
        check_frame_size(self.role, (self.width, self.height), frame)?;

        let mut rgb = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGB24, self.width, self.height);
        let stride = rgb.stride(0);
        let row_bytes = self.width as usize * 3;
        let data = rgb.data_mut(0);
        for (row, src) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
            data[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .map_err(|e| self.write_error("convert frame", e))?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder
            .send_frame(&yuv)
            .map_err(|e| self.write_error("encode frame", e))?;
        self.drain_packets()
    }

    fn close(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder
            .send_eof()
            .map_err(|e| self.write_error("flush encoder", e))?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .map_err(|e| self.write_error("write trailer", e))?;
        log::debug!("closed {} encoder {}", self.role, self.path.display());
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
