//! Conversion pipeline configuration.
//!
//! This module provides the directory layout, naming conventions, camera
//! policy and container metadata used by the batch converter. Values come
//! from defaults, an optional YAML file and CLI overrides, in that order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::container::ContainerMetadata;
use crate::video::{SecondaryCameraPolicy, VideoLayout};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value could not be parsed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The configuration file is not valid YAML for this schema.
    #[error("Failed to parse configuration file '{path}': {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the episode conversion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    // Input and output locations
    /// Directory holding one record file per episode.
    pub data_dir: PathBuf,
    /// Root of the per-camera video directories.
    pub video_dir: PathBuf,
    /// Root under which `<episode>/<episode>.<ext>` containers are written.
    pub output_dir: PathBuf,

    // Naming conventions
    /// Extension of record files (without the dot).
    pub record_extension: String,
    /// Extension of camera video files.
    pub video_extension: String,
    /// Extension of written containers.
    pub container_extension: String,
    /// Prefix of each camera's video directory name.
    pub camera_dir_prefix: String,

    // Record columns
    /// Column holding the robot state sequences.
    pub state_column: String,
    /// Column holding the action sequences.
    pub action_column: String,

    // Video decoding
    /// Behaviour when a wrist camera cannot be decoded.
    pub secondary_policy: SecondaryCameraPolicy,
    /// Explicit ffmpeg binary; `PATH` is searched when unset.
    pub ffmpeg_path: Option<PathBuf>,

    /// Root attributes written into every container.
    pub metadata: ContainerMetadata,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/chunk-000"),
            video_dir: PathBuf::from("./videos/chunk-000"),
            output_dir: PathBuf::from("./outputs"),

            record_extension: "parquet".to_string(),
            video_extension: "mp4".to_string(),
            container_extension: "hdf5".to_string(),
            camera_dir_prefix: "observation.images.".to_string(),

            state_column: "observation.state".to_string(),
            action_column: "action".to_string(),

            secondary_policy: SecondaryCameraPolicy::default(),
            ffmpeg_path: None,

            metadata: ContainerMetadata::default(),
        }
    }
}

impl ConvertConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed or validated.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("data_dir", &self.data_dir),
            ("video_dir", &self.video_dir),
            ("output_dir", &self.output_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }

        for (name, ext) in [
            ("record_extension", &self.record_extension),
            ("video_extension", &self.video_extension),
            ("container_extension", &self.container_extension),
        ] {
            if ext.is_empty() || ext.starts_with('.') || ext.contains('/') {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be a bare extension such as 'mp4', got '{}'",
                    name, ext
                )));
            }
        }

        if self.record_extension == self.container_extension {
            return Err(ConfigError::ValidationFailed(
                "record_extension and container_extension must differ".to_string(),
            ));
        }

        if self.state_column.is_empty() || self.action_column.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "state_column and action_column cannot be empty".to_string(),
            ));
        }

        if self.state_column == self.action_column {
            return Err(ConfigError::ValidationFailed(
                "state_column and action_column must name different columns".to_string(),
            ));
        }

        if self.metadata.codebase_version.is_empty() || self.metadata.robot_type.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "metadata.codebase_version and metadata.robot_type cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Video directory layout derived from this configuration.
    pub fn video_layout(&self) -> VideoLayout {
        VideoLayout::new(
            &self.video_dir,
            &self.camera_dir_prefix,
            &self.video_extension,
        )
    }

    /// `<output_dir>/<episode>/<episode>.<container_extension>`.
    pub fn container_path(&self, episode: &str) -> PathBuf {
        self.output_dir
            .join(episode)
            .join(format!("{}.{}", episode, self.container_extension))
    }

    /// Builder method to set the record directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Builder method to set the video root.
    pub fn with_video_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.video_dir = dir.into();
        self
    }

    /// Builder method to set the output root.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Builder method to set the secondary camera policy.
    pub fn with_secondary_policy(mut self, policy: SecondaryCameraPolicy) -> Self {
        self.secondary_policy = policy;
        self
    }

    /// Builder method to set the ffmpeg binary.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    /// Builder method to set the container metadata.
    pub fn with_metadata(mut self, metadata: ContainerMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builder method to set the record columns.
    pub fn with_columns(mut self, state: impl Into<String>, action: impl Into<String>) -> Self {
        self.state_column = state.into();
        self.action_column = action.into();
        self
    }
}
