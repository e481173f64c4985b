//! Episode container format.
//!
//! One HDF5 file per episode with a fixed layout:
//!
//! ```text
//! /                              codebase_version, robot_type [, missing_cameras]
//! /observation/qpos              f32 (steps, 28)  names
//! /observation/images/<camera>   u8  (steps, 3, 480, 640)  video.* attributes
//! /action                        f32 (steps, 28)  names
//! ```

pub mod reader;
pub mod writer;

use hdf5_metno::types::VarLenUnicode;
use serde::{Deserialize, Serialize};

use crate::episode::{FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH};
use crate::error::ContainerError;

pub use reader::{CameraSummary, ContainerReader, ContainerSummary};
pub use writer::ContainerWriter;

pub const OBSERVATION_GROUP: &str = "observation";
pub const IMAGES_GROUP: &str = "observation/images";
pub const STATE_DATASET: &str = "observation/qpos";
pub const ACTION_DATASET: &str = "action";

pub const NAMES_ATTR: &str = "names";
pub const CODEBASE_VERSION_ATTR: &str = "codebase_version";
pub const ROBOT_TYPE_ATTR: &str = "robot_type";
pub const MISSING_CAMERAS_ATTR: &str = "missing_cameras";

pub const FPS_ATTR: &str = "video.fps";
pub const HEIGHT_ATTR: &str = "video.height";
pub const WIDTH_ATTR: &str = "video.width";
pub const CHANNELS_ATTR: &str = "video.channels";
pub const CODEC_ATTR: &str = "video.codec";
pub const PIX_FMT_ATTR: &str = "video.pix_fmt";
pub const DEPTH_MAP_ATTR: &str = "video.is_depth_map";
pub const HAS_AUDIO_ATTR: &str = "has_audio";

/// Gzip level of the state dataset.
pub const STATE_DEFLATE_LEVEL: u8 = 3;
/// Gzip level of the action dataset.
pub const ACTION_DEFLATE_LEVEL: u8 = 4;

/// Root-level metadata of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerMetadata {
    pub codebase_version: String,
    pub robot_type: String,
}

impl Default for ContainerMetadata {
    fn default() -> Self {
        Self {
            codebase_version: "v2.0".to_string(),
            robot_type: "Unitree_G1".to_string(),
        }
    }
}

/// Metadata attached to every camera dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAttributes {
    pub fps: f64,
    pub height: i64,
    pub width: i64,
    pub channels: i64,
    pub codec: String,
    pub pix_fmt: String,
    pub is_depth_map: bool,
    pub has_audio: bool,
}

impl Default for VideoAttributes {
    fn default() -> Self {
        Self {
            fps: 30.0,
            height: FRAME_HEIGHT as i64,
            width: FRAME_WIDTH as i64,
            channels: FRAME_CHANNELS as i64,
            codec: "av1".to_string(),
            pix_fmt: "yuv420p".to_string(),
            is_depth_map: false,
            has_audio: false,
        }
    }
}

/// Dataset path of a camera inside the container.
pub fn camera_dataset(camera_key: &str) -> String {
    format!("{}/{}", IMAGES_GROUP, camera_key)
}

fn to_h5_string(value: &str) -> Result<VarLenUnicode, ContainerError> {
    value
        .parse::<VarLenUnicode>()
        .map_err(|e| ContainerError::InvalidString {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_metadata() {
        let meta = ContainerMetadata::default();
        assert_eq!(meta.codebase_version, "v2.0");
        assert_eq!(meta.robot_type, "Unitree_G1");
    }

    #[test]
    fn test_default_video_attributes() {
        let attrs = VideoAttributes::default();
        assert!((attrs.fps - 30.0).abs() < f64::EPSILON);
        assert_eq!((attrs.channels, attrs.height, attrs.width), (3, 480, 640));
        assert_eq!(attrs.codec, "av1");
        assert_eq!(attrs.pix_fmt, "yuv420p");
        assert!(!attrs.is_depth_map);
        assert!(!attrs.has_audio);
    }

    #[test]
    fn test_camera_dataset_path() {
        assert_eq!(
            camera_dataset("cam_right_high"),
            "observation/images/cam_right_high"
        );
    }

    #[test]
    fn test_metadata_partial_yaml() {
        let meta: ContainerMetadata = serde_yaml::from_str("robot_type: Unitree_H1\n").unwrap();
        assert_eq!(meta.robot_type, "Unitree_H1");
        assert_eq!(meta.codebase_version, "v2.0");
    }
}
