//! FFmpeg frame source.
//!
//! Decodes any input ffmpeg can open to RGB24: the Tello H.264 stream
//! (`udp://0.0.0.0:11111`) or a recorded flight file. Frames are handed to the
//! loop at native resolution.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::time::{Duration, Instant};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

pub struct FfmpegSource {
    url: String,
    target_fps: u32,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
}

impl FfmpegSource {
    pub fn new(url: String, target_fps: u32) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&url)
            .with_context(|| format!("failed to open input '{}' with ffmpeg", url))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow::anyhow!("input has no video track"))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            url,
            target_fps,
            input,
            stream_index,
            decoder,
            scaler,
            frame_count: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
        })
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.target_fps == 0 {
            500
        } else {
            (1000 / self.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.target_fps == 0 {
            2_000
        } else {
            (1000 / self.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for FfmpegSource {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn connect(&mut self) -> Result<()> {
        self.connected_at = Some(Instant::now());
        log::info!("FfmpegSource: connected to {}", self.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }

            // H.264 over UDP routinely loses packets; a bad packet is not fatal.
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("FfmpegSource: dropped packet: {}", e);
                continue;
            }

            if self.decoder.receive_frame(&mut decoded).is_ok() {
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;

                if let Some(last) = self.last_frame_at {
                    if last.elapsed() > self.frame_timeout() {
                        log::warn!(
                            "FfmpegSource: {}ms gap between frames",
                            last.elapsed().as_millis()
                        );
                    }
                }
                self.frame_count += 1;
                self.last_frame_at = Some(Instant::now());

                return Frame::new(pixels, width, height, self.frame_count);
            }
        }

        self.last_error = Some("input ended without frames".to_string());
        anyhow::bail!("input {} ended without frames", self.url)
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.url.clone(),
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
