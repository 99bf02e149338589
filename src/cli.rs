//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Solve a fragmented puzzle served over HTTP.
///
/// Probes the fragment source in parallel, repairs gaps until the text is
/// complete, and prints the assembled puzzle with timing statistics.
#[derive(Parser, Debug)]
#[command(name = "puzzle-solver")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/puzzle-solver/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fragment server base URL
    #[arg(short = 'u', long)]
    pub base_url: Option<String>,

    /// Maximum concurrent fetches (1-1000)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub concurrency: Option<u16>,

    /// Attempts per fragment for transient failures (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Width of each initial probe range
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Fragment count above which assembly joins in chunks
    #[arg(long)]
    pub chunk_threshold: Option<usize>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Only check that the fragment server answers, then exit
    #[arg(long)]
    pub check: bool,
}
