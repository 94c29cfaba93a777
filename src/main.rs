use clap::Parser;
use tracing::{info, warn, Level};

use hostspec::cli::{self, Cli};
use hostspec::config::LoggingSettings;

fn init_logging(logging: &LoggingSettings) {
    let level = logging.max_level();
    tracing_subscriber::fmt()
        .with_max_level(level.unwrap_or(Level::INFO))
        .with_ansi(logging.ansi)
        .with_writer(std::io::stderr)
        .init();

    if level.is_none() {
        warn!(level = %logging.level, "Unrecognized logging level, using info");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli::load_settings(&cli)?;

    // Initialize logging
    init_logging(&settings.logging);
    info!("Starting hostspec");

    cli::run(cli, settings).await
}
