//! Single-episode conversion.
//!
//! Runs the loader, the camera loaders, the consistency check and the
//! container writer for one record file. Nothing is written unless every
//! check passes.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::config::ConvertConfig;
use super::validate::check_step_counts;
use crate::container::ContainerWriter;
use crate::episode::{load_record, Episode};
use crate::error::EpisodeError;
use crate::video::{load_episode_cameras, Substitution, VideoDecoder, VideoLayout};

/// How one episode was handled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeOutcome {
    Converted {
        container: PathBuf,
        steps: usize,
        substitution: Option<Substitution>,
    },
    /// The container already existed.
    Skipped { container: PathBuf },
}

/// Converts record files into containers using one video decoder.
pub struct EpisodeConverter {
    config: ConvertConfig,
    layout: VideoLayout,
    decoder: Box<dyn VideoDecoder>,
    writer: ContainerWriter,
}

impl EpisodeConverter {
    pub fn new(config: ConvertConfig, decoder: Box<dyn VideoDecoder>) -> Self {
        let layout = config.video_layout();
        let writer = ContainerWriter::new(config.metadata.clone());
        Self {
            config,
            layout,
            decoder,
            writer,
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Episode name of a record file: its file stem.
    pub fn episode_name(record: &Path) -> Result<String, EpisodeError> {
        record
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| EpisodeError::InvalidPath(record.display().to_string()))
    }

    /// Convert one record file, skipping it when its container exists.
    pub fn convert(&self, record: &Path) -> Result<EpisodeOutcome, EpisodeError> {
        let name = Self::episode_name(record)?;
        let container = self.config.container_path(&name);

        if container.exists() {
            tracing::info!(
                episode = %name,
                path = %container.display(),
                "Container already exists, skipping"
            );
            return Ok(EpisodeOutcome::Skipped { container });
        }

        let arrays = load_record(
            record,
            &self.config.state_column,
            &self.config.action_column,
        )?;
        let mut episode = Episode::new(&name, arrays.state, arrays.action);

        let cameras = load_episode_cameras(
            self.decoder.as_ref(),
            &self.layout,
            &name,
            self.config.secondary_policy,
        )?;
        episode.cameras = cameras.frames;
        episode.missing_cameras = cameras.missing;

        check_step_counts(&episode)?;

        self.writer.write(&container, &episode)?;

        Ok(EpisodeOutcome::Converted {
            container,
            steps: episode.steps(),
            substitution: cameras.substitution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_name_from_stem() {
        let name =
            EpisodeConverter::episode_name(Path::new("/data/chunk-000/episode_000012.parquet"))
                .unwrap();
        assert_eq!(name, "episode_000012");
    }

    #[test]
    fn test_episode_name_rejects_empty_path() {
        assert!(matches!(
            EpisodeConverter::episode_name(Path::new("/")),
            Err(EpisodeError::InvalidPath(_))
        ));
    }
}
