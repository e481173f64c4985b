//! CLI command definitions for teleop-forge.
//!
//! `convert` runs the batch pipeline, `inspect` summarizes one container and
//! `play` drives a headless playback session over it.

use std::path::PathBuf;

use clap::builder::TypedValueParser;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::container::ContainerReader;
use crate::pipeline::{BatchDriver, BatchReport, ConfigError, ConvertConfig, EpisodeConverter};
use crate::playback::{PlaybackSession, PlaybackStats, MAX_PREFETCH};
use crate::video::{FfmpegDecoder, SecondaryCameraPolicy};

/// Default number of frames read ahead during playback.
const DEFAULT_PREFETCH: usize = 8;

/// Robot teleoperation episode converter and player.
#[derive(Parser)]
#[command(name = "teleop-forge")]
#[command(about = "Convert teleoperation recordings into HDF5 episode containers")]
#[command(version)]
#[command(
    long_about = "teleop-forge joins each episode's parquet record with its camera videos and writes one HDF5 container per episode.\n\nExample usage:\n  teleop-forge convert --data-dir ./data/chunk-000 --video-dir ./videos/chunk-000 --output-dir ./outputs\n  teleop-forge play ./outputs/episode_000000/episode_000000.hdf5"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Convert every episode of a data directory into containers.
    Convert(ConvertArgs),

    /// Print the schema and attributes of a container.
    Inspect(InspectArgs),

    /// Play a container headlessly at its nominal frame rate.
    Play(PlayArgs),
}

/// Arguments for the convert command.
#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// YAML configuration file. Flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding one parquet record per episode.
    #[arg(long, env = "TELEOP_FORGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Root of the per-camera video directories.
    #[arg(long, env = "TELEOP_FORGE_VIDEO_DIR")]
    pub video_dir: Option<PathBuf>,

    /// Root directory for the written containers.
    #[arg(short, long, env = "TELEOP_FORGE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// What to do when a wrist camera fails to decode (zero-frames, abort, omit).
    #[arg(long)]
    pub secondary_policy: Option<String>,

    /// Path to the ffmpeg binary. Searched on PATH when omitted.
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Output JSON to stdout instead of a text summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the inspect command.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Container file to inspect.
    pub file: PathBuf,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the play command.
#[derive(Parser, Debug)]
pub struct PlayArgs {
    /// Container file to play.
    pub file: PathBuf,

    /// Read frames as fast as possible instead of at the nominal rate.
    #[arg(long)]
    pub no_pace: bool,

    /// Number of frames to read ahead (1 to 1024).
    #[arg(
        long,
        default_value_t = DEFAULT_PREFETCH,
        value_parser = clap::value_parser!(u16)
            .range(1..=MAX_PREFETCH as i64)
            .map(usize::from)
    )]
    pub prefetch: usize,

    /// Output JSON to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Log filter for the binary.
///
/// `RUST_LOG` wins over `--log-level`; an unparsable level falls back to `info`.
pub fn log_filter(cli_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Convert(args) => run_convert_command(args).await,
        Commands::Inspect(args) => run_inspect_command(args),
        Commands::Play(args) => run_play_command(args).await,
    }
}

// ============================================================================
// Convert
// ============================================================================

/// Build the pipeline configuration: file values first, then CLI flags.
fn build_convert_config(args: &ConvertArgs) -> Result<ConvertConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => ConvertConfig::from_yaml_file(path)?,
        None => ConvertConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(dir) = &args.video_dir {
        config = config.with_video_dir(dir);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(raw) = &args.secondary_policy {
        let policy = raw
            .parse::<SecondaryCameraPolicy>()
            .map_err(|message| ConfigError::InvalidValue {
                key: "secondary_policy".to_string(),
                message,
            })?;
        config = config.with_secondary_policy(policy);
    }
    if let Some(path) = &args.ffmpeg {
        config = config.with_ffmpeg_path(path);
    }

    config.validate()?;
    Ok(config)
}

async fn run_convert_command(args: ConvertArgs) -> anyhow::Result<()> {
    let config = build_convert_config(&args)?;

    if !config.data_dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Data directory does not exist: {}",
            config.data_dir.display()
        ));
    }

    let decoder = match &config.ffmpeg_path {
        Some(path) => FfmpegDecoder::new().with_ffmpeg_path(path),
        None => FfmpegDecoder::new(),
    };

    info!(
        data_dir = %config.data_dir.display(),
        video_dir = %config.video_dir.display(),
        output_dir = %config.output_dir.display(),
        secondary_policy = %config.secondary_policy,
        "Converting episodes"
    );

    let driver = BatchDriver::new(EpisodeConverter::new(config, Box::new(decoder)));
    let report = tokio::task::spawn_blocking(move || driver.run())
        .await
        .map_err(|e| anyhow::anyhow!("Conversion task failed: {}", e))??;

    if args.json {
        let json_output = serde_json::to_string_pretty(&report)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    print_batch_report(&report);
    Ok(())
}

fn print_batch_report(report: &BatchReport) {
    println!(
        "Processed {} episodes: {} converted, {} skipped, {} failed",
        report.total(),
        report.converted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for substitution in &report.substitutions {
        println!(
            "  {}: {} footage stored as {}",
            substitution.episode, substitution.substitution.source, substitution.substitution.target
        );
    }
    if report.has_failures() {
        warn!("{} episodes failed to convert", report.failed.len());
        for failed in &report.failed {
            println!("  FAILED {}: {}", failed.episode, failed.error);
        }
    }
}

// ============================================================================
// Inspect
// ============================================================================

fn run_inspect_command(args: InspectArgs) -> anyhow::Result<()> {
    let reader = ContainerReader::open(&args.file)?;
    let summary = reader.summary()?;

    if args.json {
        let json_output = serde_json::to_string_pretty(&summary)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    println!("{}", summary.path.display());
    println!(
        "  codebase_version={} robot_type={}",
        summary.metadata.codebase_version, summary.metadata.robot_type
    );
    println!(
        "  steps={} state={:?} action={:?}",
        summary.steps, summary.state_shape, summary.action_shape
    );
    for camera in &summary.cameras {
        println!(
            "  {} frames={} shape={:?} fps={} codec={}",
            camera.key, camera.frames, camera.shape, camera.video.fps, camera.video.codec
        );
    }
    if !summary.missing_cameras.is_empty() {
        println!("  missing cameras: {}", summary.missing_cameras.join(", "));
    }
    Ok(())
}

// ============================================================================
// Play
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct PlayOutput {
    file: PathBuf,
    cameras: Vec<String>,
    #[serde(flatten)]
    stats: PlaybackStats,
}

async fn run_play_command(args: PlayArgs) -> anyhow::Result<()> {
    let mut session = PlaybackSession::open(&args.file)?;

    info!(
        path = %args.file.display(),
        frames = session.total_frames(),
        fps = session.fps(),
        "Starting playback"
    );

    let stats = session.play(args.prefetch, !args.no_pace).await?;
    let output = PlayOutput {
        file: args.file,
        cameras: session.cameras().to_vec(),
        stats,
    };

    if args.json {
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    println!(
        "Played {} frames from {} cameras in {:.2}s ({:.1} fps, nominal {:.1})",
        output.stats.frames,
        output.stats.cameras,
        output.stats.elapsed_secs,
        output.stats.effective_fps,
        output.stats.nominal_fps
    );
    Ok(())
}
