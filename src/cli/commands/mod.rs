//! Subcommands module for Restible CLI
//!
//! This module contains all the subcommand implementations.

pub mod list;
pub mod run;

use crate::cli::output::OutputFormatter;
use restible::config::Config;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Check mode (dry-run)
    pub check_mode: bool,
    /// Diff mode
    pub diff_mode: bool,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.colors.is_enabled();
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());

        Self {
            config,
            output,
            check_mode: cli.check_mode,
            diff_mode: cli.diff_mode,
        }
    }
}
