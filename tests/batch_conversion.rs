//! End-to-end batch conversion tests.
//!
//! Record files are written with arrow/parquet and video decoding is replaced
//! by an in-memory decoder, so no ffmpeg binary is required.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float32Builder, ListBuilder};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

use teleop_forge::container::{ContainerReader, ACTION_DATASET, STATE_DATASET};
use teleop_forge::episode::{Camera, FrameArray, JOINT_COUNT, JOINT_NAMES};
use teleop_forge::pipeline::{BatchDriver, ConvertConfig, EpisodeConverter};
use teleop_forge::video::{SecondaryCameraPolicy, VideoDecoder, VideoLayout};
use teleop_forge::VideoError;

/// Serves pre-built frame arrays keyed by video path.
#[derive(Default)]
struct FixtureDecoder {
    videos: HashMap<PathBuf, FrameArray>,
}

impl VideoDecoder for FixtureDecoder {
    fn decode(&self, path: &Path) -> Result<FrameArray, VideoError> {
        self.videos
            .get(path)
            .cloned()
            .ok_or_else(|| VideoError::NotFound(path.display().to_string()))
    }
}

struct Fixture {
    _dir: TempDir,
    config: ConvertConfig,
    layout: VideoLayout,
    decoder: FixtureDecoder,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        let config = ConvertConfig::new()
            .with_data_dir(&data_dir)
            .with_video_dir(dir.path().join("videos"))
            .with_output_dir(dir.path().join("outputs"));
        let layout = config.video_layout();
        Self {
            _dir: dir,
            config,
            layout,
            decoder: FixtureDecoder::default(),
        }
    }

    fn add_record(&self, episode: &str, columns: Vec<(&str, ArrayRef)>) {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, arr)| Field::new(*name, arr.data_type().clone(), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, arr)| arr).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

        let path = self.config.data_dir.join(format!("{}.parquet", episode));
        let mut writer = ArrowWriter::try_new(File::create(path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    fn add_standard_record(&self, episode: &str, steps: usize) {
        self.add_record(
            episode,
            vec![
                ("observation.state", joint_column(steps, JOINT_COUNT, 0.0)),
                ("action", joint_column(steps, JOINT_COUNT, 0.5)),
                ("timestamp", joint_column(steps, 1, 0.0)),
            ],
        );
    }

    fn add_video(&mut self, camera: Camera, episode: &str, frames: usize, fill: u8) {
        let path = self.layout.video_path(camera, episode);
        self.decoder
            .videos
            .insert(path, FrameArray::from_elem((frames, 3, 480, 640), fill));
    }

    fn add_all_videos(&mut self, episode: &str, frames: usize) {
        for (camera, fill) in [
            (Camera::HighRight, 10),
            (Camera::HighLeft, 20),
            (Camera::WristLeft, 30),
            (Camera::WristRight, 40),
        ] {
            self.add_video(camera, episode, frames, fill);
        }
    }

    fn driver(self) -> (BatchDriver, ConvertConfig, TempDir) {
        let Fixture {
            _dir,
            config,
            decoder,
            ..
        } = self;
        let converter = EpisodeConverter::new(config.clone(), Box::new(decoder));
        (BatchDriver::new(converter), config, _dir)
    }
}

fn joint_column(steps: usize, width: usize, offset: f32) -> ArrayRef {
    let mut builder = ListBuilder::new(Float32Builder::new());
    for step in 0..steps {
        let row: Vec<f32> = (0..width)
            .map(|j| step as f32 * 100.0 + j as f32 + offset)
            .collect();
        builder.values().append_slice(&row);
        builder.append(true);
    }
    Arc::new(builder.finish())
}

#[test]
fn test_converts_well_formed_episode() {
    let mut fixture = Fixture::new();
    fixture.add_standard_record("episode_000000", 4);
    fixture.add_all_videos("episode_000000", 4);
    let (driver, config, _dir) = fixture.driver();

    let report = driver.run().unwrap();
    assert_eq!(report.converted, vec!["episode_000000"]);
    assert!(report.failed.is_empty());
    assert!(report.substitutions.is_empty());

    let reader = ContainerReader::open(config.container_path("episode_000000")).unwrap();
    let state = reader.state().unwrap();
    let action = reader.action().unwrap();
    assert_eq!(state.dim(), (4, JOINT_COUNT));
    assert_eq!(action.dim(), (4, JOINT_COUNT));
    assert_eq!(state[[2, 5]], 205.0);
    assert_eq!(action[[2, 5]], 205.5);

    let state_names = reader.channel_names(STATE_DATASET).unwrap();
    assert_eq!(state_names, reader.channel_names(ACTION_DATASET).unwrap());
    assert_eq!(state_names.len(), JOINT_COUNT);
    assert_eq!(state_names[0], JOINT_NAMES[0]);

    assert_eq!(
        reader.camera_keys().unwrap(),
        vec!["cam_left_wrist", "cam_right_high", "cam_right_wrist"]
    );
    for key in reader.camera_keys().unwrap() {
        assert_eq!(reader.frame_count(&key).unwrap(), 4);
    }
    assert_eq!(reader.read_frame("cam_right_high", 3).unwrap()[[0, 0, 0]], 10);
}

#[test]
fn test_second_run_skips_existing_containers() {
    let mut fixture = Fixture::new();
    fixture.add_standard_record("episode_000000", 2);
    fixture.add_all_videos("episode_000000", 2);
    let (driver, config, _dir) = fixture.driver();

    assert_eq!(driver.run().unwrap().converted.len(), 1);
    let path = config.container_path("episode_000000");
    let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

    let report = driver.run().unwrap();
    assert!(report.converted.is_empty());
    assert_eq!(report.skipped, vec!["episode_000000"]);
    assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
}

#[test]
fn test_primary_camera_falls_back_to_left_high() {
    let mut fixture = Fixture::new();
    fixture.add_standard_record("episode_000001", 3);
    fixture.add_video(Camera::HighLeft, "episode_000001", 3, 20);
    fixture.add_video(Camera::WristLeft, "episode_000001", 3, 30);
    fixture.add_video(Camera::WristRight, "episode_000001", 3, 40);
    let (driver, config, _dir) = fixture.driver();

    let report = driver.run().unwrap();
    assert_eq!(report.converted, vec!["episode_000001"]);
    assert_eq!(report.substitutions.len(), 1);
    assert_eq!(report.substitutions[0].substitution.source, Camera::HighLeft);

    let reader = ContainerReader::open(config.container_path("episode_000001")).unwrap();
    let frames = reader.read_camera("cam_right_high").unwrap();
    assert!(frames.iter().all(|&v| v == 20));
    assert!(!reader.camera_keys().unwrap().contains(&"cam_left_high".to_string()));
}

#[test]
fn test_failures_are_isolated_and_write_nothing() {
    let mut fixture = Fixture::new();
    // Missing action column.
    fixture.add_record(
        "episode_000000",
        vec![("observation.state", joint_column(2, JOINT_COUNT, 0.0))],
    );
    fixture.add_all_videos("episode_000000", 2);
    // 27 joints instead of 28.
    fixture.add_record(
        "episode_000001",
        vec![
            ("observation.state", joint_column(2, 27, 0.0)),
            ("action", joint_column(2, JOINT_COUNT, 0.0)),
        ],
    );
    fixture.add_all_videos("episode_000001", 2);
    // Wrist camera shorter than the episode.
    fixture.add_standard_record("episode_000002", 3);
    fixture.add_video(Camera::HighRight, "episode_000002", 3, 10);
    fixture.add_video(Camera::WristLeft, "episode_000002", 2, 30);
    fixture.add_video(Camera::WristRight, "episode_000002", 3, 40);
    // Well formed.
    fixture.add_standard_record("episode_000003", 2);
    fixture.add_all_videos("episode_000003", 2);
    let (driver, config, _dir) = fixture.driver();

    let report = driver.run().unwrap();
    assert_eq!(report.converted, vec!["episode_000003"]);
    let failed: Vec<_> = report.failed.iter().map(|f| f.episode.as_str()).collect();
    assert_eq!(failed, vec!["episode_000000", "episode_000001", "episode_000002"]);
    assert!(report.failed[0].error.contains("'action'"));
    assert!(report.failed[2].error.contains("cam_left_wrist"));

    for episode in ["episode_000000", "episode_000001", "episode_000002"] {
        assert!(!config.output_dir.join(episode).exists());
    }
    assert!(config.container_path("episode_000003").exists());
}

#[test]
fn test_missing_wrist_camera_policies() {
    let run = |policy: SecondaryCameraPolicy| {
        let mut fixture = Fixture::new();
        fixture.config = fixture.config.clone().with_secondary_policy(policy);
        fixture.add_standard_record("episode_000000", 2);
        fixture.add_video(Camera::HighRight, "episode_000000", 2, 10);
        fixture.add_video(Camera::WristLeft, "episode_000000", 2, 30);
        let (driver, config, dir) = fixture.driver();
        (driver.run().unwrap(), config, dir)
    };

    let (report, _, _dir) = run(SecondaryCameraPolicy::ZeroFrames);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("0 frames"));

    let (report, _, _dir) = run(SecondaryCameraPolicy::Abort);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("could not be decoded"));

    let (report, config, _dir) = run(SecondaryCameraPolicy::Omit);
    assert_eq!(report.converted, vec!["episode_000000"]);
    let reader = ContainerReader::open(config.container_path("episode_000000")).unwrap();
    assert_eq!(reader.missing_cameras().unwrap(), vec!["cam_right_wrist"]);
    assert_eq!(
        reader.camera_keys().unwrap(),
        vec!["cam_left_wrist", "cam_right_high"]
    );
}

#[test]
fn test_report_serializes_to_json() {
    let mut fixture = Fixture::new();
    fixture.add_standard_record("episode_000004", 1);
    fixture.add_video(Camera::HighLeft, "episode_000004", 1, 20);
    fixture.add_video(Camera::WristLeft, "episode_000004", 1, 30);
    fixture.add_video(Camera::WristRight, "episode_000004", 1, 40);
    let (driver, _config, _dir) = fixture.driver();

    let report = driver.run().unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["converted"][0], "episode_000004");
    assert_eq!(json["substitutions"][0]["episode"], "episode_000004");
    assert_eq!(json["substitutions"][0]["target"], "cam_right_high");
    assert_eq!(json["substitutions"][0]["source"], "cam_left_high");
}
