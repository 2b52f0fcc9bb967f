//! netdrift - network configuration backup, drift detection and safe deployment
//!
//! This is the main entry point for the netdrift CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use netdrift::config::{Config, LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; a broken config file is reported, not fatal
    let (config, config_error) = match Config::load(cli.config.as_ref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Initialize logging based on verbosity and config
    init_logging(cli.verbosity(), &config.logging);

    if cli.verbosity() >= 2 {
        eprintln!("netdrift v{} by {}", VERSION, AUTHORS);
    }

    let mut ctx = CommandContext::new(&cli, config);
    if let Some(e) = config_error {
        ctx.output
            .warning(&format!("Failed to load config, using defaults: {:#}", e));
    }

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Backup(args) => args.execute(&mut ctx).await,
        Commands::Drift(args) => args.execute(&mut ctx).await,
        Commands::Deploy(args) => args.execute(&mut ctx).await,
        Commands::Promote(args) => args.execute(&mut ctx).await,
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            e.downcast_ref::<netdrift::Error>()
                .map_or(1, netdrift::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 3),
            )
            .with(env_filter)
            .init(),
    }
}
