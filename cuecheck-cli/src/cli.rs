use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Where the absolute stream start time comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClockMode {
    /// First/last TDT or STT reported by `tsp -P analyze`
    #[default]
    Tsp,
    /// TDT/TOT sections found while scanning the stream
    Stream,
}

impl std::fmt::Display for ClockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockMode::Tsp => write!(f, "tsp"),
            ClockMode::Stream => write!(f, "stream"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Transport stream files, or directories scanned for `.ts` files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Project configuration bundle (JSON)
    #[arg(short, long, env = "CUECHECK_CONFIG")]
    pub config: PathBuf,

    /// Directory receiving one `<stem>.report.json` per input
    #[arg(short, long, env = "CUECHECK_OUTPUT", default_value = ".")]
    pub output_dir: PathBuf,

    /// Files analysed concurrently
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Print a machine-readable batch summary on stdout
    #[arg(long)]
    pub json: bool,

    /// Skip ffprobe/mediainfo based asset analysis
    #[arg(long)]
    pub no_media: bool,

    #[arg(long, value_enum, default_value_t = ClockMode::Tsp)]
    pub clock: ClockMode,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
