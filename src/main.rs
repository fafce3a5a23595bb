//! EZPass - field-mapping autofill client
//!
//! Command-line host for the autofill core: fetch, fill, map and save
//! against a local credential service.

mod cli;
mod cmd_page;
mod cmd_service;
mod prompt;

use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ezpass_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig, default_config_path};

use crate::cli::{Cli, Commands};

fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&logging.directory)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("ezpass")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&logging.directory)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keeps the file writer alive for the program duration
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        // Console layer on stderr, stdout carries command output
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = if cli.config.is_some() {
        ConfigLoader::load(&path)?
    } else {
        ConfigLoader::load_or_default(&path)?
    };
    if let Some(endpoint) = &cli.endpoint {
        config.sync.endpoint = endpoint.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config.logging)?;

    for warning in ConfigValidator::ensure_valid(&config)? {
        warn!("{}: {}", warning.path, warning.message);
    }

    match cli.command {
        Commands::Normalize { address } => {
            cmd_service::normalize(&address);
            Ok(())
        }
        Commands::Fetch { address } => cmd_service::fetch(&config, &address).await,
        Commands::Fill { page, write } => cmd_page::fill(&config, &page, write).await,
        Commands::Map { page, target, role } => {
            cmd_page::map(&config, &page, &target, &role).await
        }
        Commands::Mappings { address } => cmd_page::mappings(&config, address.as_deref()).await,
        Commands::Save { page } => cmd_page::save(&config, &page).await,
    }
}
