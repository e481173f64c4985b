//! Per-camera video loading.
//!
//! Decoding is behind the [`VideoDecoder`] trait so the conversion pipeline can
//! run against ffmpeg in production and against in-memory frames in tests.
//! Decode failures never propagate out of [`load_camera`]: they become a
//! zero-frame array and the caller checks the frame count.

pub mod ffmpeg;
pub mod selection;

use std::path::{Path, PathBuf};

use crate::episode::{empty_frames, Camera, FrameArray};
use crate::error::VideoError;

pub use ffmpeg::FfmpegDecoder;
pub use selection::{load_episode_cameras, CameraLoad, SecondaryCameraPolicy, Substitution};

/// Decodes one video file into a `(frames, 3, 480, 640)` array.
pub trait VideoDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<FrameArray, VideoError>;
}

/// Resolves camera video paths inside the video root.
///
/// Layout: `<root>/<prefix><camera-key>/<episode>.<extension>`.
#[derive(Debug, Clone)]
pub struct VideoLayout {
    pub root: PathBuf,
    pub camera_dir_prefix: String,
    pub extension: String,
}

impl VideoLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        camera_dir_prefix: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            camera_dir_prefix: camera_dir_prefix.into(),
            extension: extension.into(),
        }
    }

    pub fn camera_dir(&self, camera: Camera) -> PathBuf {
        self.root
            .join(format!("{}{}", self.camera_dir_prefix, camera.key()))
    }

    pub fn video_path(&self, camera: Camera, episode: &str) -> PathBuf {
        self.camera_dir(camera)
            .join(format!("{}.{}", episode, self.extension))
    }
}

/// Decode the video of `camera` for `episode`, returning zero frames on failure.
pub fn load_camera(
    decoder: &dyn VideoDecoder,
    layout: &VideoLayout,
    camera: Camera,
    episode: &str,
) -> FrameArray {
    let path = layout.video_path(camera, episode);
    match decoder.decode(&path) {
        Ok(frames) => {
            tracing::debug!(
                episode = %episode,
                camera = %camera,
                frames = frames.shape()[0],
                "Video decoded"
            );
            frames
        }
        Err(e) => {
            tracing::warn!(
                episode = %episode,
                camera = %camera,
                path = %path.display(),
                error = %e,
                "Video decode failed"
            );
            empty_frames()
        }
    }
}
