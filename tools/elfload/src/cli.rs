//! Command-line interface definitions for ember-elfload.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use log::LevelFilter;

/// Classify, load and relocate an ELF stage image into a memory window.
#[derive(Parser, Debug)]
#[command(name = "ember-elfload", version, about)]
pub struct Cli {
    /// ELF image to load.
    pub input: PathBuf,

    /// Address of the load window. Defaults to the image's preferred address.
    ///
    /// With `--direct`, the address the image must have been linked at.
    #[arg(long, short = 'a', value_parser = parse_address)]
    pub load_address: Option<u64>,

    /// Place segments at their physical addresses and never relocate.
    #[arg(long)]
    pub direct: bool,

    /// Skip header classification before a rebased load.
    #[arg(long, conflicts_with = "direct")]
    pub no_classify: bool,

    /// Write the loaded window to this file.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Only report errors.
    #[arg(long, short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show loader progress; repeat for per-entry tracing.
    #[arg(long, short = 'v', action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log level selected by `-q` / `-v`.
    pub fn level_filter(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Parses a decimal or `0x`-prefixed hexadecimal address; `_` separators are
/// allowed.
pub fn parse_address(s: &str) -> Result<u64, String> {
    let digits: String = s.chars().filter(|&c| c != '_').collect();
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{s}`: {e}"))
}
