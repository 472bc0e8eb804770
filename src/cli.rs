//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use pctl::output::{ColorChoice, OutputConfig};

/// pctl - Install and upgrade flux deployment profiles
#[derive(Parser, Debug)]
#[command(name = "pctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output
    #[arg(long, global = true, value_name = "WHEN", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install a profile into a directory as flux manifests
    Install(commands::install::InstallArgs),

    /// Upgrade an installation to a new profile version
    Upgrade(commands::upgrade::UpgradeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .parse_default_env()
            .format_timestamp(None)
            .init();

        let output = OutputConfig::new(self.color);

        match self.command {
            Commands::Install(args) => commands::install::execute(args, &output),
            Commands::Upgrade(args) => commands::upgrade::execute(args, &output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
