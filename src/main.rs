//! The `pctl` binary.
//!
//! Argument parsing and console output live here; installing and upgrading
//! are done by the `pctl` library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    cli::Cli::parse().execute()
}
