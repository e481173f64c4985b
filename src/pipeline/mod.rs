//! Batch conversion of recorded episodes into HDF5 containers.
//!
//! # Architecture
//!
//! - **Config**: directory layout, naming and camera policy
//! - **Converter**: loads, checks and writes a single episode
//! - **Driver**: walks the data directory and isolates per-episode failures
//! - **Validate**: step-count consistency checks run before any write
//!
//! # Example
//!
//! ```rust,ignore
//! use teleop_forge::pipeline::{BatchDriver, ConvertConfig, EpisodeConverter};
//! use teleop_forge::video::FfmpegDecoder;
//!
//! let config = ConvertConfig::new()
//!     .with_data_dir("./data/chunk-000")
//!     .with_video_dir("./videos/chunk-000")
//!     .with_output_dir("./outputs");
//!
//! let converter = EpisodeConverter::new(config, Box::new(FfmpegDecoder::new()));
//! let report = BatchDriver::new(converter).run()?;
//! println!("converted {} episodes", report.converted.len());
//! ```

pub mod config;
pub mod converter;
pub mod driver;
pub mod validate;

pub use config::{ConfigError, ConvertConfig};
pub use converter::{EpisodeConverter, EpisodeOutcome};
pub use driver::{BatchDriver, BatchReport, FailedEpisode, SubstitutionRecord};
pub use validate::check_step_counts;
