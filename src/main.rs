use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use life_wheel::{cli::Cli, handler};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.settings.log_level.as_str())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!(command = ?cli.command, "starting");

    if let Err(e) = handler::run(cli).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
