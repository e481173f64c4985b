//! Read access to episode containers.
//!
//! Used by the playback session and the `inspect` command; only needs the
//! schema documented in the parent module.

use std::path::{Path, PathBuf};

use hdf5_metno::types::VarLenUnicode;
use hdf5_metno::{File, Location};
use ndarray::{s, Array3, Ix3, Ix4};
use serde::Serialize;

use super::{
    camera_dataset, ContainerMetadata, VideoAttributes, ACTION_DATASET, CHANNELS_ATTR,
    CODEBASE_VERSION_ATTR, CODEC_ATTR, DEPTH_MAP_ATTR, FPS_ATTR, HAS_AUDIO_ATTR, HEIGHT_ATTR,
    IMAGES_GROUP, MISSING_CAMERAS_ATTR, NAMES_ATTR, PIX_FMT_ATTR, ROBOT_TYPE_ATTR, STATE_DATASET,
    WIDTH_ATTR,
};
use crate::episode::{FrameArray, JointArray};
use crate::error::ContainerError;

/// Per-camera entry of a [`ContainerSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct CameraSummary {
    pub key: String,
    pub frames: usize,
    pub shape: Vec<usize>,
    pub video: VideoAttributes,
}

/// Overview of a container, as printed by `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub path: PathBuf,
    pub metadata: ContainerMetadata,
    pub steps: usize,
    pub state_shape: Vec<usize>,
    pub action_shape: Vec<usize>,
    pub channel_names: Vec<String>,
    pub cameras: Vec<CameraSummary>,
    pub missing_cameras: Vec<String>,
}

/// Read-only handle on an episode container.
pub struct ContainerReader {
    path: PathBuf,
    file: File,
}

impl ContainerReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> Result<ContainerMetadata, ContainerError> {
        Ok(ContainerMetadata {
            codebase_version: read_string_attr(&self.file, CODEBASE_VERSION_ATTR)?,
            robot_type: read_string_attr(&self.file, ROBOT_TYPE_ATTR)?,
        })
    }

    /// Cameras left out by the `omit` secondary policy.
    pub fn missing_cameras(&self) -> Result<Vec<String>, ContainerError> {
        if !self
            .file
            .attr_names()?
            .iter()
            .any(|n| n == MISSING_CAMERAS_ATTR)
        {
            return Ok(Vec::new());
        }
        read_string_list_attr(&self.file, MISSING_CAMERAS_ATTR)
    }

    pub fn state(&self) -> Result<JointArray, ContainerError> {
        Ok(self.dataset(STATE_DATASET)?.read_2d::<f32>()?)
    }

    pub fn action(&self) -> Result<JointArray, ContainerError> {
        Ok(self.dataset(ACTION_DATASET)?.read_2d::<f32>()?)
    }

    /// The `names` attribute of a numeric dataset.
    pub fn channel_names(&self, dataset: &str) -> Result<Vec<String>, ContainerError> {
        let ds = self.dataset(dataset)?;
        read_string_list_attr(&ds, NAMES_ATTR)
    }

    /// Camera keys present in the container, sorted.
    pub fn camera_keys(&self) -> Result<Vec<String>, ContainerError> {
        let group = self
            .file
            .group(IMAGES_GROUP)
            .map_err(|_| ContainerError::MissingDataset(IMAGES_GROUP.to_string()))?;
        let mut keys = group.member_names()?;
        keys.sort();
        Ok(keys)
    }

    pub fn frame_count(&self, camera: &str) -> Result<usize, ContainerError> {
        let shape = self.dataset(&camera_dataset(camera))?.shape();
        Ok(shape.first().copied().unwrap_or(0))
    }

    pub fn read_camera(&self, camera: &str) -> Result<FrameArray, ContainerError> {
        Ok(self.dataset(&camera_dataset(camera))?.read::<u8, Ix4>()?)
    }

    /// One channel-first frame; reads a single chunk.
    pub fn read_frame(&self, camera: &str, index: usize) -> Result<Array3<u8>, ContainerError> {
        let ds = self.dataset(&camera_dataset(camera))?;
        let frames = ds.shape().first().copied().unwrap_or(0);
        if index >= frames {
            return Err(ContainerError::FrameOutOfRange {
                camera: camera.to_string(),
                index,
                frames,
            });
        }
        Ok(ds.read_slice::<u8, _, Ix3>(s![index, .., .., ..])?)
    }

    pub fn video_attributes(&self, camera: &str) -> Result<VideoAttributes, ContainerError> {
        let ds = self.dataset(&camera_dataset(camera))?;
        Ok(VideoAttributes {
            fps: ds.attr(FPS_ATTR)?.read_scalar::<f64>()?,
            height: ds.attr(HEIGHT_ATTR)?.read_scalar::<i64>()?,
            width: ds.attr(WIDTH_ATTR)?.read_scalar::<i64>()?,
            channels: ds.attr(CHANNELS_ATTR)?.read_scalar::<i64>()?,
            codec: read_string_attr(&ds, CODEC_ATTR)?,
            pix_fmt: read_string_attr(&ds, PIX_FMT_ATTR)?,
            is_depth_map: ds.attr(DEPTH_MAP_ATTR)?.read_scalar::<bool>()?,
            has_audio: ds.attr(HAS_AUDIO_ATTR)?.read_scalar::<bool>()?,
        })
    }

    pub fn summary(&self) -> Result<ContainerSummary, ContainerError> {
        let state_shape = self.dataset(STATE_DATASET)?.shape();
        let action_shape = self.dataset(ACTION_DATASET)?.shape();

        let mut cameras = Vec::new();
        for key in self.camera_keys()? {
            let shape = self.dataset(&camera_dataset(&key))?.shape();
            cameras.push(CameraSummary {
                frames: shape.first().copied().unwrap_or(0),
                shape,
                video: self.video_attributes(&key)?,
                key,
            });
        }

        Ok(ContainerSummary {
            path: self.path.clone(),
            metadata: self.metadata()?,
            steps: state_shape.first().copied().unwrap_or(0),
            state_shape,
            action_shape,
            channel_names: self.channel_names(STATE_DATASET)?,
            cameras,
            missing_cameras: self.missing_cameras()?,
        })
    }

    fn dataset(&self, name: &str) -> Result<hdf5_metno::Dataset, ContainerError> {
        self.file
            .dataset(name)
            .map_err(|_| ContainerError::MissingDataset(name.to_string()))
    }
}

fn read_string_attr(location: &Location, name: &str) -> Result<String, ContainerError> {
    Ok(location
        .attr(name)?
        .read_scalar::<VarLenUnicode>()?
        .as_str()
        .to_string())
}

fn read_string_list_attr(location: &Location, name: &str) -> Result<Vec<String>, ContainerError> {
    Ok(location
        .attr(name)?
        .read_raw::<VarLenUnicode>()?
        .iter()
        .map(|v| v.as_str().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ContainerWriter, STATE_DATASET};
    use crate::episode::{Camera, Episode, JOINT_COUNT, JOINT_NAMES};
    use crate::video::testing::solid_frames;
    use tempfile::TempDir;

    fn sample_episode(steps: usize) -> Episode {
        let state = JointArray::from_shape_fn((steps, JOINT_COUNT), |(s, j)| (s * 10 + j) as f32);
        let action = state.mapv(|v| v + 0.5);
        let mut frames = solid_frames(steps, 0);
        frames[[1, 2, 100, 200]] = 77;
        Episode::new("episode_000042", state, action)
            .with_camera(Camera::HighRight, frames)
            .with_camera(Camera::WristLeft, solid_frames(steps, 3))
            .with_camera(Camera::WristRight, solid_frames(steps, 4))
    }

    fn write_sample(dir: &TempDir, episode: &Episode) -> PathBuf {
        let path = dir
            .path()
            .join(&episode.name)
            .join(format!("{}.hdf5", episode.name));
        ContainerWriter::default().write(&path, episode).unwrap();
        path
    }

    #[test]
    fn test_written_schema() {
        let dir = TempDir::new().unwrap();
        let episode = sample_episode(3);
        let path = write_sample(&dir, &episode);
        assert!(path.exists());
        assert!(!path.with_file_name("episode_000042.hdf5.partial").exists());

        let reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.metadata().unwrap(), ContainerMetadata::default());
        assert_eq!(reader.state().unwrap(), episode.state);
        assert_eq!(reader.action().unwrap(), episode.action);

        let state_names = reader.channel_names(STATE_DATASET).unwrap();
        let action_names = reader.channel_names(ACTION_DATASET).unwrap();
        assert_eq!(state_names, action_names);
        assert_eq!(state_names, JOINT_NAMES.to_vec());

        assert_eq!(
            reader.camera_keys().unwrap(),
            vec!["cam_left_wrist", "cam_right_high", "cam_right_wrist"]
        );
        assert!(reader.missing_cameras().unwrap().is_empty());
    }

    #[test]
    fn test_video_attributes_and_frames() {
        let dir = TempDir::new().unwrap();
        let episode = sample_episode(3);
        let path = write_sample(&dir, &episode);
        let reader = ContainerReader::open(&path).unwrap();

        for key in reader.camera_keys().unwrap() {
            assert_eq!(reader.frame_count(&key).unwrap(), 3);
            assert_eq!(reader.video_attributes(&key).unwrap(), VideoAttributes::default());
        }

        let frame = reader.read_frame("cam_right_high", 1).unwrap();
        assert_eq!(frame.shape(), &[3, 480, 640]);
        assert_eq!(frame[[2, 100, 200]], 77);

        let all = reader.read_camera("cam_right_high").unwrap();
        assert_eq!(all, episode.cameras[&Camera::HighRight]);
    }

    #[test]
    fn test_read_frame_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, &sample_episode(2));
        let reader = ContainerReader::open(&path).unwrap();

        let err = reader.read_frame("cam_left_wrist", 2).unwrap_err();
        assert!(matches!(err, ContainerError::FrameOutOfRange { frames: 2, .. }));
        assert!(matches!(
            reader.read_frame("cam_top", 0).unwrap_err(),
            ContainerError::MissingDataset(_)
        ));
    }

    #[test]
    fn test_missing_cameras_attribute() {
        let dir = TempDir::new().unwrap();
        let mut episode = sample_episode(2);
        episode.cameras.remove(&Camera::WristRight);
        episode.missing_cameras.push(Camera::WristRight);
        let path = write_sample(&dir, &episode);

        let reader = ContainerReader::open(&path).unwrap();
        assert_eq!(reader.missing_cameras().unwrap(), vec!["cam_right_wrist"]);
        assert_eq!(
            reader.camera_keys().unwrap(),
            vec!["cam_left_wrist", "cam_right_high"]
        );
    }

    #[test]
    fn test_summary() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, &sample_episode(4));
        let summary = ContainerReader::open(&path).unwrap().summary().unwrap();

        assert_eq!(summary.steps, 4);
        assert_eq!(summary.state_shape, vec![4, JOINT_COUNT]);
        assert_eq!(summary.action_shape, vec![4, JOINT_COUNT]);
        assert_eq!(summary.cameras.len(), 3);
        assert!(summary.cameras.iter().all(|c| c.frames == 4));
        assert_eq!(summary.cameras[0].shape, vec![4, 3, 480, 640]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["metadata"]["robot_type"], "Unitree_G1");
    }
}
