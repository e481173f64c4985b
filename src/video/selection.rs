//! Camera selection and fallback policy.
//!
//! The primary camera (`cam_right_high`) falls back to `cam_left_high` when it
//! cannot be decoded; losing both aborts the episode. Wrist cameras have no
//! fallback and what happens when one fails is decided by
//! [`SecondaryCameraPolicy`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{load_camera, VideoDecoder, VideoLayout};
use crate::episode::{Camera, FrameArray};
use crate::error::EpisodeError;

/// What to do when a wrist camera yields no frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondaryCameraPolicy {
    /// Keep the zero-frame array and let the step-count check decide.
    #[default]
    ZeroFrames,
    /// Fail the episode with a decode error.
    Abort,
    /// Leave the camera out of the container and list it in `missing_cameras`.
    Omit,
}

impl fmt::Display for SecondaryCameraPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecondaryCameraPolicy::ZeroFrames => "zero-frames",
            SecondaryCameraPolicy::Abort => "abort",
            SecondaryCameraPolicy::Omit => "omit",
        };
        f.write_str(name)
    }
}

impl FromStr for SecondaryCameraPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "zero-frames" | "zero_frames" => Ok(SecondaryCameraPolicy::ZeroFrames),
            "abort" => Ok(SecondaryCameraPolicy::Abort),
            "omit" => Ok(SecondaryCameraPolicy::Omit),
            other => Err(format!(
                "unknown secondary camera policy '{}', expected zero-frames, abort or omit",
                other
            )),
        }
    }
}

/// Footage of one camera stored under another camera's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub target: Camera,
    pub source: Camera,
}

/// Result of loading every written camera of an episode.
#[derive(Debug, Clone)]
pub struct CameraLoad {
    pub frames: BTreeMap<Camera, FrameArray>,
    pub substitution: Option<Substitution>,
    pub missing: Vec<Camera>,
}

/// Load every written camera, applying the fallback and secondary policies.
pub fn load_episode_cameras(
    decoder: &dyn VideoDecoder,
    layout: &VideoLayout,
    episode: &str,
    policy: SecondaryCameraPolicy,
) -> Result<CameraLoad, EpisodeError> {
    let mut frames = BTreeMap::new();
    let mut substitution = None;
    let mut missing = Vec::new();

    for camera in Camera::WRITTEN {
        let camera_frames = load_camera(decoder, layout, camera, episode);
        if camera_frames.shape()[0] > 0 {
            frames.insert(camera, camera_frames);
            continue;
        }

        if let Some(source) = camera.fallback() {
            let source_frames = load_camera(decoder, layout, source, episode);
            if source_frames.shape()[0] == 0 {
                tracing::error!(
                    episode = %episode,
                    camera = %camera,
                    fallback = %source,
                    "Primary camera and its fallback both failed to decode"
                );
                return Err(EpisodeError::VideoDecodeFailure {
                    camera: camera.key().to_string(),
                    reason: format!("no frames decoded, fallback '{}' also failed", source),
                });
            }
            tracing::warn!(
                episode = %episode,
                camera = %camera,
                fallback = %source,
                "Primary camera failed to decode, substituting fallback footage"
            );
            substitution = Some(Substitution {
                target: camera,
                source,
            });
            frames.insert(camera, source_frames);
            continue;
        }

        match policy {
            SecondaryCameraPolicy::ZeroFrames => {
                tracing::warn!(
                    episode = %episode,
                    camera = %camera,
                    "Secondary camera has no frames"
                );
                frames.insert(camera, camera_frames);
            }
            SecondaryCameraPolicy::Abort => {
                return Err(EpisodeError::VideoDecodeFailure {
                    camera: camera.key().to_string(),
                    reason: "no frames decoded".to_string(),
                });
            }
            SecondaryCameraPolicy::Omit => {
                tracing::warn!(
                    episode = %episode,
                    camera = %camera,
                    "Secondary camera has no frames, omitting it from the container"
                );
                missing.push(camera);
            }
        }
    }

    Ok(CameraLoad {
        frames,
        substitution,
        missing,
    })
}
