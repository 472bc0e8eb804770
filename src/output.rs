//! Console output settings.
//!
//! `pctl` decorates its progress lines with emoji and colors the paths it
//! reports (conflicting files after an upgrade, for instance). Both are
//! switched off together when the terminal or the environment asks for
//! plain output:
//!
//! - `--color=never|always|auto`
//! - `NO_COLOR` set to anything (<https://no-color.org/>)
//! - `CLICOLOR=0`, or `CLICOLOR_FORCE=1` to force color off a TTY
//! - `TERM=dumb`
//!
//! ```rust
//! use pctl::output::{emoji, ColorChoice, OutputConfig};
//!
//! let config = OutputConfig::new(ColorChoice::Never);
//! assert_eq!(emoji(&config, "📦", "[INSTALL]"), "[INSTALL]");
//! ```

use std::env;

use clap::ValueEnum;
use console::style;

/// Value of the `--color` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Decide from the environment and the terminal
    #[default]
    Auto,
    /// Always decorate output
    Always,
    /// Never decorate output
    Never,
}

/// Whether console output is decorated.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    pub fn new(choice: ColorChoice) -> Self {
        let use_color = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => detect_color_support(),
        };
        Self { use_color }
    }

    /// Colors `path` for listing, when decoration is on.
    pub fn path(&self, path: impl std::fmt::Display) -> String {
        if self.use_color {
            style(path).yellow().to_string()
        } else {
            path.to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

fn detect_color_support() -> bool {
    // Presence alone disables, even when empty.
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}

/// Picks `emoji_str` when decoration is on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}
