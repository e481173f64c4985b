//! teleop-forge binary.

use tracing_subscriber::{fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = teleop_forge::cli::parse_cli();

    // Logs go to stderr so `--json` output on stdout stays machine-readable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(teleop_forge::cli::log_filter(&cli.log_level))
        .init();

    teleop_forge::cli::run_with_cli(cli).await
}
