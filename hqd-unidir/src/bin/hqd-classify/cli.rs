use clap::Parser;
use std::path::PathBuf;

/// Classify unidirectional streams from their raw prefaces.
///
/// Each positional argument is the hex-encoded content of one client
/// unidirectional stream (ids 2, 6, 10, ...). The bytes are fed through the
/// dispatcher in chunks and the resulting hand-off is printed per stream.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Deliver each stream in chunks of this many bytes
    #[arg(long, default_value_t = 1)]
    pub chunk_size: usize,

    /// Keep codec side channels on the peek API
    #[arg(long)]
    pub partial_reliability: bool,

    /// Send FIN after the last chunk of every stream
    #[arg(long)]
    pub fin: bool,

    /// Print default configuration and exit
    #[arg(long)]
    pub print_default_config: bool,

    /// Hex-encoded stream contents, e.g. `00` or `0105` or `40214142`
    #[arg(value_name = "HEX")]
    pub streams: Vec<String>,
}
