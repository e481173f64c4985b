//! Decode camera videos with the `ffmpeg` executable.
//!
//! ffmpeg writes `rgb24` raw frames to stdout; each frame arrives in
//! height-width-channel order and is transposed to channel-first before it is
//! appended to the output buffer.

use std::path::{Path, PathBuf};

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use ndarray::ArrayView3;

use super::VideoDecoder;
use crate::episode::{FrameArray, FRAME_CHANNELS, FRAME_HEIGHT, FRAME_SHAPE, FRAME_WIDTH};
use crate::error::VideoError;

/// [`VideoDecoder`] backed by an ffmpeg subprocess.
#[derive(Debug, Clone, Default)]
pub struct FfmpegDecoder {
    /// Explicit ffmpeg binary; `None` searches `PATH`.
    ffmpeg_path: Option<PathBuf>,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    fn command(&self) -> FfmpegCommand {
        match &self.ffmpeg_path {
            Some(path) => FfmpegCommand::new_with_path(path),
            None => FfmpegCommand::new(),
        }
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn decode(&self, path: &Path) -> Result<FrameArray, VideoError> {
        if !path.is_file() {
            return Err(VideoError::NotFound(path.display().to_string()));
        }

        let mut child = self
            .command()
            .hide_banner()
            .input(&*path.to_string_lossy())
            .rawvideo()
            .spawn()
            .map_err(VideoError::Spawn)?;

        let events = match child.iter() {
            Ok(events) => events,
            Err(e) => {
                stop_child(&mut child, path);
                return Err(VideoError::Ffmpeg(e.to_string()));
            }
        };

        let mut buffer = Vec::new();
        let mut frames = 0usize;
        let mut fatal: Option<String> = None;

        for event in events {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    let appended = check_frame_shape(frame.width, frame.height)
                        .and_then(|()| append_channel_first(&mut buffer, &frame.data));
                    if let Err(e) = appended {
                        stop_child(&mut child, path);
                        return Err(e);
                    }
                    frames += 1;
                }
                FfmpegEvent::Log(LogLevel::Fatal, msg) => {
                    fatal.get_or_insert(msg);
                }
                FfmpegEvent::Log(LogLevel::Error, msg) | FfmpegEvent::Error(msg) => {
                    tracing::debug!(path = %path.display(), message = %msg, "FFmpeg reported an error");
                }
                _ => {}
            }
        }

        let status = child.wait().map_err(VideoError::Spawn)?;
        if let Some(msg) = fatal {
            return Err(VideoError::Ffmpeg(msg));
        }
        if !status.success() && frames == 0 {
            return Err(VideoError::Ffmpeg(format!("ffmpeg exited with {}", status)));
        }
        if frames == 0 {
            return Err(VideoError::NoFrames);
        }

        Ok(FrameArray::from_shape_vec(
            (frames, FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH),
            buffer,
        )?)
    }
}

/// Reject frames that are not `480x640`; nothing is ever resized.
fn check_frame_shape(width: u32, height: u32) -> Result<(), VideoError> {
    let actual = [FRAME_CHANNELS, height as usize, width as usize];
    if actual != FRAME_SHAPE {
        return Err(VideoError::FrameShape {
            expected: FRAME_SHAPE,
            actual,
        });
    }
    Ok(())
}

/// Kill ffmpeg and reap it so an early return never leaves a zombie.
fn stop_child(child: &mut FfmpegChild, path: &Path) {
    let kill_result = child.kill();
    let wait_result = child.wait();
    if kill_result.is_err() || wait_result.is_err() {
        tracing::debug!(
            path = %path.display(),
            "FFmpeg kill result: {:?}, wait result: {:?}",
            kill_result,
            wait_result
        );
    }
}

/// Append one packed `rgb24` frame to `buffer` in channel-first order.
fn append_channel_first(buffer: &mut Vec<u8>, rgb: &[u8]) -> Result<(), VideoError> {
    let hwc = ArrayView3::from_shape((FRAME_HEIGHT, FRAME_WIDTH, FRAME_CHANNELS), rgb)?;
    buffer.reserve(rgb.len());
    buffer.extend(hwc.permuted_axes([2, 0, 1]).iter().copied());
    Ok(())
}
