//! Playback session state.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ndarray::{ArrayView1, Axis};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use super::prefetch::FramePrefetcher;
use crate::container::{ContainerReader, VideoAttributes, STATE_DATASET};
use crate::episode::JointArray;
use crate::error::ContainerError;

/// Highest frame rate a session will pace at.
pub const MAX_FPS: f64 = 1000.0;

/// The container's frame rate, or the default when it is unusable.
fn playback_rate(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 && fps <= MAX_FPS {
        fps
    } else {
        tracing::warn!(fps, "Invalid frame rate in container, using the default");
        VideoAttributes::default().fps
    }
}

/// Timing figures of one playback run.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStats {
    pub frames: usize,
    pub cameras: usize,
    pub nominal_fps: f64,
    pub elapsed_secs: f64,
    pub effective_fps: f64,
}

/// Everything needed to play one container from start to finish.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    path: PathBuf,
    cameras: Vec<String>,
    total_frames: usize,
    position: usize,
    fps: f64,
    frame_interval: Duration,
    channel_names: Vec<String>,
    state: JointArray,
}

impl PlaybackSession {
    /// Open a container and read the data shared by every frame.
    ///
    /// The frame rate comes from the first camera's `video.fps` attribute.
    /// When cameras disagree on length, playback stops at the shortest.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let reader = ContainerReader::open(path.as_ref())?;
        let cameras = reader.camera_keys()?;
        let state = reader.state()?;
        let channel_names = reader.channel_names(STATE_DATASET)?;

        let mut total_frames = state.nrows();
        for camera in &cameras {
            total_frames = total_frames.min(reader.frame_count(camera)?);
        }

        let fps = match cameras.first() {
            Some(camera) => reader.video_attributes(camera)?.fps,
            None => VideoAttributes::default().fps,
        };
        let fps = playback_rate(fps);

        tracing::debug!(
            path = %path.as_ref().display(),
            cameras = cameras.len(),
            frames = total_frames,
            fps,
            "Playback session opened"
        );

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            cameras,
            total_frames,
            position: 0,
            fps,
            frame_interval: Duration::from_secs_f64(1.0 / fps),
            channel_names,
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cameras(&self) -> &[String] {
        &self.cameras
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Index of the next frame to show.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    /// Step to the next frame, returning the index to show.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        let index = self.position;
        self.position += 1;
        Some(index)
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.total_frames
    }

    /// The state series of one joint over the whole episode.
    pub fn state_series(&self, joint: &str) -> Option<ArrayView1<'_, f32>> {
        let column = self.channel_names.iter().position(|n| n == joint)?;
        (column < self.state.ncols()).then(|| self.state.index_axis(Axis(1), column))
    }

    /// Prefetch the remaining frames of the session.
    pub fn prefetcher(&self, capacity: usize) -> FramePrefetcher {
        FramePrefetcher::spawn(
            self.path.clone(),
            self.cameras.clone(),
            self.position,
            self.total_frames,
            capacity,
        )
    }

    /// Play the remaining frames, optionally paced at the nominal frame rate.
    pub async fn play(
        &mut self,
        capacity: usize,
        pace: bool,
    ) -> Result<PlaybackStats, ContainerError> {
        let started = Instant::now();
        let mut prefetcher = self.prefetcher(capacity);
        let mut ticker = pace.then(|| {
            let mut ticker = tokio::time::interval(self.frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let mut shown = 0usize;
        while let Some(index) = self.advance() {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
            match prefetcher.next().await {
                Some(Ok(frame)) => {
                    if frame.index != index {
                        tracing::warn!(expected = index, got = frame.index, "Frame out of order");
                    }
                    shown += 1;
                }
                Some(Err(e)) => {
                    prefetcher.finish().await;
                    return Err(e);
                }
                None => break,
            }
        }
        prefetcher.finish().await;

        let elapsed_secs = started.elapsed().as_secs_f64();
        Ok(PlaybackStats {
            frames: shown,
            cameras: self.cameras.len(),
            nominal_fps: self.fps,
            elapsed_secs,
            effective_fps: if elapsed_secs > 0.0 {
                shown as f64 / elapsed_secs
            } else {
                0.0
            },
        })
    }
}
