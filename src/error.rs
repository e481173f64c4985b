//! Error types for teleop-forge operations.
//!
//! Defines error types for the conversion subsystems:
//! - Episode loading, validation and conversion
//! - Video decoding
//! - Container (HDF5) reading and writing

use thiserror::Error;

/// Errors that abort the conversion of a single episode.
///
/// These are caught at the batch boundary; one failing episode never stops
/// the rest of the batch.
#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("Record file is missing required column '{column}', available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Column '{column}' has an invalid shape: {reason}")]
    ShapeMismatch { column: String, reason: String },

    #[error("Video for camera '{camera}' could not be decoded: {reason}")]
    VideoDecodeFailure { camera: String, reason: String },

    #[error("Camera '{camera}' has {frames} frames but the episode has {steps} steps")]
    StepCountMismatch {
        camera: String,
        steps: usize,
        frames: usize,
    },

    #[error("Invalid record file path: {0}")]
    InvalidPath(String),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while decoding one video file.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Video file not found: {0}")]
    NotFound(String),

    #[error("Failed to start FFmpeg: {0}")]
    Spawn(std::io::Error),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    #[error("Unexpected frame shape: expected {expected:?}, got {actual:?}")]
    FrameShape {
        expected: [usize; 3],
        actual: [usize; 3],
    },

    #[error("Frame layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("Video contains no frames")]
    NoFrames,
}

/// Errors that can occur during container operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5_metno::Error),

    #[error("Invalid string attribute value '{value}': {reason}")]
    InvalidString { value: String, reason: String },

    #[error("Container has no dataset '{0}'")]
    MissingDataset(String),

    #[error("Frame index {index} out of range for camera '{camera}' with {frames} frames")]
    FrameOutOfRange {
        camera: String,
        index: usize,
        frames: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_lists_available() {
        let err = EpisodeError::MissingColumn {
            column: "action".to_string(),
            available: vec!["observation.state".to_string(), "timestamp".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'action'"));
        assert!(msg.contains("observation.state"));
        assert!(msg.contains("timestamp"));
    }

    #[test]
    fn test_step_count_mismatch_display() {
        let err = EpisodeError::StepCountMismatch {
            camera: "cam_left_wrist".to_string(),
            steps: 120,
            frames: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("cam_left_wrist"));
        assert!(msg.contains("120"));
        assert!(msg.contains("0 frames"));
    }

    #[test]
    fn test_container_error_wraps_into_episode_error() {
        let err: EpisodeError = ContainerError::MissingDataset("action".to_string()).into();
        assert!(matches!(err, EpisodeError::Container(_)));
        assert!(err.to_string().contains("action"));
    }
}
