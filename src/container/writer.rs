//! Container writer.
//!
//! Writes a validated [`Episode`] in one pass. The file is built next to its
//! destination under a `.partial` name and renamed into place once closed, so
//! an interrupted or failed write never leaves a container at the final path.

use std::path::{Path, PathBuf};

use hdf5_metno::types::VarLenUnicode;
use hdf5_metno::{File, H5Type, Location};

use super::{
    to_h5_string, ContainerMetadata, VideoAttributes, ACTION_DATASET, ACTION_DEFLATE_LEVEL,
    CHANNELS_ATTR, CODEBASE_VERSION_ATTR, CODEC_ATTR, DEPTH_MAP_ATTR, FPS_ATTR, HAS_AUDIO_ATTR,
    HEIGHT_ATTR, MISSING_CAMERAS_ATTR, NAMES_ATTR, OBSERVATION_GROUP, PIX_FMT_ATTR,
    ROBOT_TYPE_ATTR, STATE_DEFLATE_LEVEL, WIDTH_ATTR,
};
use crate::episode::{Episode, FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH, JOINT_NAMES};
use crate::error::ContainerError;

/// Writes episodes as HDF5 containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerWriter {
    metadata: ContainerMetadata,
    video: VideoAttributes,
}

impl ContainerWriter {
    pub fn new(metadata: ContainerMetadata) -> Self {
        Self {
            metadata,
            video: VideoAttributes::default(),
        }
    }

    /// Builder method to set the attributes stored on every camera dataset.
    pub fn with_video_attributes(mut self, video: VideoAttributes) -> Self {
        self.video = video;
        self
    }

    /// Write `episode` to `destination`, creating the parent directory if needed.
    ///
    /// The episode is trusted to be consistent; no shape checks happen here.
    pub fn write(&self, destination: &Path, episode: &Episode) -> Result<(), ContainerError> {
        let parent = destination.parent().filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = parent {
            std::fs::create_dir_all(dir)?;
        }

        let partial = partial_path(destination);
        let result = self
            .write_file(&partial, episode)
            .and_then(|()| std::fs::rename(&partial, destination).map_err(ContainerError::from));

        if let Err(e) = &result {
            tracing::error!(
                path = %destination.display(),
                error = %e,
                "Container write failed, removing partial file"
            );
            let _ = std::fs::remove_file(&partial);
            if let Some(dir) = parent {
                // Only succeeds when nothing else lives in the episode directory.
                let _ = std::fs::remove_dir(dir);
            }
            return result;
        }

        tracing::info!(
            path = %destination.display(),
            steps = episode.steps(),
            cameras = episode.cameras.len(),
            "Container written"
        );
        Ok(())
    }

    fn write_file(&self, path: &Path, episode: &Episode) -> Result<(), ContainerError> {
        let file = File::create(path)?;

        write_string_attr(&file, CODEBASE_VERSION_ATTR, &self.metadata.codebase_version)?;
        write_string_attr(&file, ROBOT_TYPE_ATTR, &self.metadata.robot_type)?;
        if !episode.missing_cameras.is_empty() {
            let missing: Vec<&str> = episode.missing_cameras.iter().map(|c| c.key()).collect();
            write_string_list_attr(&file, MISSING_CAMERAS_ATTR, &missing)?;
        }

        let observation = file.create_group(OBSERVATION_GROUP)?;
        let state = observation
            .new_dataset_builder()
            .deflate(STATE_DEFLATE_LEVEL)
            .with_data(&episode.state)
            .create("qpos")?;
        write_string_list_attr(&state, NAMES_ATTR, &JOINT_NAMES)?;

        let images = observation.create_group("images")?;
        for (camera, frames) in &episode.cameras {
            let dataset = images
                .new_dataset_builder()
                .chunk((1, FRAME_CHANNELS, FRAME_HEIGHT, FRAME_WIDTH))
                .lzf()
                .with_data(frames)
                .create(camera.key())?;
            self.write_video_attrs(&dataset)?;
        }

        let action = file
            .new_dataset_builder()
            .deflate(ACTION_DEFLATE_LEVEL)
            .with_data(&episode.action)
            .create(ACTION_DATASET)?;
        write_string_list_attr(&action, NAMES_ATTR, &JOINT_NAMES)?;
        Ok(())
    }

    fn write_video_attrs(&self, dataset: &Location) -> Result<(), ContainerError> {
        let video = &self.video;
        write_scalar_attr(dataset, FPS_ATTR, &video.fps)?;
        write_scalar_attr(dataset, HEIGHT_ATTR, &video.height)?;
        write_scalar_attr(dataset, WIDTH_ATTR, &video.width)?;
        write_scalar_attr(dataset, CHANNELS_ATTR, &video.channels)?;
        write_string_attr(dataset, CODEC_ATTR, &video.codec)?;
        write_string_attr(dataset, PIX_FMT_ATTR, &video.pix_fmt)?;
        write_scalar_attr(dataset, DEPTH_MAP_ATTR, &video.is_depth_map)?;
        write_scalar_attr(dataset, HAS_AUDIO_ATTR, &video.has_audio)?;
        Ok(())
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

fn write_scalar_attr<T: H5Type>(
    location: &Location,
    name: &str,
    value: &T,
) -> Result<(), ContainerError> {
    location.new_attr::<T>().create(name)?.write_scalar(value)?;
    Ok(())
}

fn write_string_attr(location: &Location, name: &str, value: &str) -> Result<(), ContainerError> {
    write_scalar_attr(location, name, &to_h5_string(value)?)
}

fn write_string_list_attr(
    location: &Location,
    name: &str,
    values: &[&str],
) -> Result<(), ContainerError> {
    let values = values
        .iter()
        .map(|v| to_h5_string(v))
        .collect::<Result<Vec<VarLenUnicode>, _>>()?;
    location
        .new_attr::<VarLenUnicode>()
        .shape(values.len())
        .create(name)?
        .write_raw(&values)?;
    Ok(())
}
