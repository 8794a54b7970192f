//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Mirror a remote file set into a local folder.
///
/// hfsync polls the server's file index, downloads every missing or stale file
/// through a small pool of throttled workers, then sleeps until the next check.
#[derive(Parser, Debug)]
#[command(name = "hfsync")]
#[command(author, version, about)]
pub struct Args {
    /// Settings file (TOML; replaces the INI-format hfsync.ini of older releases)
    #[arg(short, long, default_value = "hfsync.toml")]
    pub config: PathBuf,

    /// Print this machine's credential and exit
    #[arg(short, long)]
    pub key: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Default log filter for these flags, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
