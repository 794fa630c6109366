//! CLI surface (component K) — mirrors the reference tool's flag set.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "rmux", version, about = "Run a command across many targets concurrently")]
pub struct Cli {
    /// Maximum concurrent targets.
    #[arg(short = 'M', long = "max")]
    pub max: Option<u64>,

    /// Default method for targets with no method prefix.
    #[arg(short = 'm', long = "method")]
    pub method: Option<String>,

    /// Command to run on each target.
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// Enable the liveness-ping phase.
    #[arg(short = 'p', long = "ping")]
    pub ping: bool,

    /// Ping poll interval in milliseconds.
    #[arg(short = 'P', long = "ping-interval")]
    pub ping_interval_ms: Option<u64>,

    /// Enable the health-test phase.
    #[arg(short = 't', long = "test")]
    pub test: bool,

    /// Command-phase timeout in seconds.
    #[arg(short = 'T', long = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Print internal/informational messages.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Suppress per-target screen output.
    #[arg(short = 's', long = "silent")]
    pub silent: bool,

    /// Suppress the status line.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Directory to copy per-target stdout/stderr/exit files into.
    #[arg(short = 'd', long = "output-dir")]
    pub output_dir: Option<String>,

    /// Enable debug logging.
    #[arg(short = 'D', long = "debug")]
    pub debug: bool,

    /// Explicit configuration file, overriding `rmux.toml` discovery.
    #[arg(long = "config")]
    pub config: Option<String>,

    /// Read additional targets from a file, one per line (# comments, blanks skipped).
    #[arg(long = "file")]
    pub file: Option<String>,

    /// Target specs, e.g. `host1 ssh2:host2 sh:localhost`.
    pub targets: Vec<String>,
}
