use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use world_bench_curator::cli::{execute_command, Commands};
use world_bench_curator::config::{LogFormat, LoggingConfig};

/// Author, expand, analyze and render benchmark worlds
#[derive(Parser, Debug)]
#[command(name = "world-bench-curator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before reading logging settings
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&LoggingConfig::from_env());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "World Bench Curator starting..."
    );

    let result = match execute_command(cli.command).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Command failed");
            return Err(e.into());
        }
    };

    println!("{}", result.message);
    if result.exit_code != 0 {
        error!(exit_code = result.exit_code, "Finished with render failures");
        std::process::exit(result.exit_code);
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
