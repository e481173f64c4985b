//! Batch driver.
//!
//! Enumerates the record files of the data directory and converts them one
//! at a time. A failing episode is logged and recorded in the report; the
//! batch moves on to the next record.

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::converter::{EpisodeConverter, EpisodeOutcome};
use crate::error::EpisodeError;
use crate::video::Substitution;

/// An episode that could not be converted.
#[derive(Debug, Clone, Serialize)]
pub struct FailedEpisode {
    pub episode: String,
    pub record: PathBuf,
    pub error: String,
}

/// A primary-camera substitution applied while converting an episode.
#[derive(Debug, Clone, Serialize)]
pub struct SubstitutionRecord {
    pub episode: String,
    #[serde(flatten)]
    pub substitution: Substitution,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub converted: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedEpisode>,
    pub substitutions: Vec<SubstitutionRecord>,
}

impl BatchReport {
    /// Number of record files the batch looked at.
    pub fn total(&self) -> usize {
        self.converted.len() + self.skipped.len() + self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Drives an [`EpisodeConverter`] over every record file of a directory.
pub struct BatchDriver {
    converter: EpisodeConverter,
}

impl BatchDriver {
    pub fn new(converter: EpisodeConverter) -> Self {
        Self { converter }
    }

    /// Record files directly inside `dir` with the given extension, sorted by path.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be listed.
    pub fn discover_records(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, EpisodeError> {
        let mut records = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                records.push(path.to_path_buf());
            }
        }
        records.sort();
        Ok(records)
    }

    /// Convert every record file of the configured data directory.
    pub fn run(&self) -> Result<BatchReport, EpisodeError> {
        let config = self.converter.config();
        let records = Self::discover_records(&config.data_dir, &config.record_extension)?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            records = records.len(),
            "Starting batch conversion"
        );

        let mut report = BatchReport::default();
        for record in &records {
            let episode = EpisodeConverter::episode_name(record)
                .unwrap_or_else(|_| record.display().to_string());

            match self.converter.convert(record) {
                Ok(EpisodeOutcome::Converted {
                    container,
                    steps,
                    substitution,
                }) => {
                    tracing::info!(
                        episode = %episode,
                        steps,
                        path = %container.display(),
                        "Episode converted"
                    );
                    if let Some(substitution) = substitution {
                        report.substitutions.push(SubstitutionRecord {
                            episode: episode.clone(),
                            substitution,
                        });
                    }
                    report.converted.push(episode);
                }
                Ok(EpisodeOutcome::Skipped { .. }) => report.skipped.push(episode),
                Err(e) => {
                    tracing::error!(episode = %episode, error = %e, "Episode conversion failed");
                    report.failed.push(FailedEpisode {
                        episode,
                        record: record.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            converted = report.converted.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Batch conversion finished"
        );

        Ok(report)
    }
}
