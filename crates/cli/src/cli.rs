//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// eventbridge - fan resource change events out to notification plugins
#[derive(Parser, Debug)]
#[command(
    name = "eventbridge",
    author,
    version,
    about = "Resource change event dispatcher",
    long_about = "Subscribes to a stream of resource change events and fans each event out \n\
                  to every configured plugin. Every plugin runs behind its own bounded \n\
                  queue and worker pool, so a slow plugin never stalls the others."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVENTBRIDGE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVENTBRIDGE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dispatcher
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// List registered plugin types
    Plugins(PluginsArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "eventbridge.toml",
        env = "EVENTBRIDGE_CONFIG"
    )]
    pub config: PathBuf,

    /// JSON-lines file of recorded envelopes (overrides [source].replay_path)
    #[arg(long, env = "EVENTBRIDGE_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Delay between replayed envelopes in milliseconds (overrides [source].interval_ms)
    #[arg(long)]
    pub replay_interval_ms: Option<u64>,

    /// Restart the replay from the beginning when exhausted
    #[arg(long)]
    pub replay_loop: bool,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "EVENTBRIDGE_TIMEOUT")]
    pub timeout: u64,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "EVENTBRIDGE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "eventbridge.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `plugins` command
#[derive(Parser, Debug)]
pub struct PluginsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
