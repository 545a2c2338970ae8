//! Restible - Ansible-style modules for REST-managed resources
//!
//! This is the main entry point for the Restible CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use restible::config::{Config, LogFormat, LoggingConfig};
use restible::error::Error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration; an explicitly requested file must load
    let config = match Config::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            let err = Error::Config(format!("{:#}", e));
            cli::output::OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity())
                .error(&err.to_string());
            std::process::exit(err.exit_code());
        }
        Err(e) => {
            if cli.verbosity() >= 1 {
                eprintln!("Warning: Failed to load config: {:#}", e);
            }
            Config::default()
        }
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), &config.logging);

    tracing::debug!(
        version = restible::VERSION,
        sources = ?config.sources,
        "configuration loaded"
    );
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Run(args) => args.execute(&mut ctx)?,
        Commands::List => cli::commands::list::execute(&mut ctx)?,
        Commands::Completions(args) => {
            cli::completions::generate_completions(args.shell);
            0
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
///
/// Logs go to stderr so stdout carries only the module result.
fn init_logging(verbosity: u8, logging: &LoggingConfig) {
    let filter = match verbosity {
        0 => logging.level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format() {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(verbosity >= 3)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
