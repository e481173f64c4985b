//! Episode data model.
//!
//! An [`Episode`] is one recorded teleoperation trial: a state matrix, an
//! action matrix and the decoded footage of each written camera. Episodes are
//! built by the loaders, consumed once by the container writer, then dropped.

pub mod joints;
pub mod loader;

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array2, Array4};
use serde::{Deserialize, Serialize};

pub use joints::{JOINT_COUNT, JOINT_NAMES};
pub use loader::{load_record, RecordArrays};

/// Color channels per frame.
pub const FRAME_CHANNELS: usize = 3;
/// Frame height in pixels.
pub const FRAME_HEIGHT: usize = 480;
/// Frame width in pixels.
pub const FRAME_WIDTH: usize = 640;
/// Channel-first shape of a single frame.
pub const FRAME_SHAPE: [usize; 3] = [FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH];

/// Dense `(steps, 28)` joint matrix.
pub type JointArray = Array2<f32>;

/// Dense `(frames, 3, 480, 640)` channel-first video.
pub type FrameArray = Array4<u8>;

/// Builds a zero-frame video array, the explicit "decode failed" result.
pub fn empty_frames() -> FrameArray {
    FrameArray::zeros((0, FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH))
}

/// Camera identifiers recognized in the recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Camera {
    /// Head-mounted left camera. Only used as the fallback for [`Camera::HighRight`].
    #[serde(rename = "cam_left_high")]
    HighLeft,
    /// Head-mounted right camera, the primary view.
    #[serde(rename = "cam_right_high")]
    HighRight,
    #[serde(rename = "cam_left_wrist")]
    WristLeft,
    #[serde(rename = "cam_right_wrist")]
    WristRight,
}

impl Camera {
    /// Cameras that end up in the container. Only the first has a fallback.
    pub const WRITTEN: [Camera; 3] = [Camera::HighRight, Camera::WristLeft, Camera::WristRight];

    /// Dataset and directory key for this camera.
    pub fn key(self) -> &'static str {
        match self {
            Camera::HighLeft => "cam_left_high",
            Camera::HighRight => "cam_right_high",
            Camera::WristLeft => "cam_left_wrist",
            Camera::WristRight => "cam_right_wrist",
        }
    }

    /// Camera whose footage may stand in for this one.
    pub fn fallback(self) -> Option<Camera> {
        match self {
            Camera::HighRight => Some(Camera::HighLeft),
            _ => None,
        }
    }

    pub fn from_key(key: &str) -> Option<Camera> {
        match key {
            "cam_left_high" => Some(Camera::HighLeft),
            "cam_right_high" => Some(Camera::HighRight),
            "cam_left_wrist" => Some(Camera::WristLeft),
            "cam_right_wrist" => Some(Camera::WristRight),
            _ => None,
        }
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A fully loaded episode ready for validation and writing.
#[derive(Debug, Clone)]
pub struct Episode {
    /// Name derived from the record file stem.
    pub name: String,
    pub state: JointArray,
    pub action: JointArray,
    /// Frames per written camera.
    pub cameras: BTreeMap<Camera, FrameArray>,
    /// Cameras deliberately left out of the container.
    pub missing_cameras: Vec<Camera>,
}

impl Episode {
    pub fn new(name: impl Into<String>, state: JointArray, action: JointArray) -> Self {
        Self {
            name: name.into(),
            state,
            action,
            cameras: BTreeMap::new(),
            missing_cameras: Vec::new(),
        }
    }

    /// Number of time steps, taken from the state rows.
    pub fn steps(&self) -> usize {
        self.state.nrows()
    }

    pub fn with_camera(mut self, camera: Camera, frames: FrameArray) -> Self {
        self.cameras.insert(camera, frames);
        self
    }
}
