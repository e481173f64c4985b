//! teleop-forge: converts robot teleoperation recordings into HDF5 episode
//! containers and plays them back headlessly.
//!
//! Each episode pairs a columnar record file (joint state and action
//! sequences) with one video per camera. The pipeline joins them, checks that
//! every stream has one entry per time step and writes a fixed-schema
//! container per episode.

// Core modules
pub mod cli;
pub mod container;
pub mod episode;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod video;

// Re-export commonly used error types
pub use error::{ContainerError, EpisodeError, VideoError};
