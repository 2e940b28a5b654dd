//! Structured logging for Letmeask processes.
//!
//! Every process logs through `tracing`. [`init_logging`] installs a
//! subscriber that prints human-readable lines to stderr and, when a logs
//! directory is configured, also appends one JSON object per event to
//! `{logs_dir}/{date}_{session}.jsonl`.
//!
//! ## Querying logs with jq
//!
//! ```bash
//! # Everything that happened to one room
//! jq 'select(.fields.room_id == "-Nabc")' logs/*.jsonl
//!
//! # Rejected accounts
//! jq 'select(.level == "error")' logs/*.jsonl
//! ```

pub mod entry;
pub mod layer;
pub mod writer;

use std::path::PathBuf;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::{LetmeaskError, LetmeaskResult};

pub use entry::JsonLogEntry;
pub use layer::JsonlLayer;
pub use writer::{read_entries, SessionLogWriter};

/// How a process wants to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for JSONL files; `None` disables file logging
    pub logs_dir: Option<PathBuf>,
    /// Session name used in the JSONL file name and in every entry
    pub session: String,
    /// Filter directives used when `RUST_LOG` is not set
    pub default_filter: String,
    /// Print to stderr
    pub console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            logs_dir: None,
            session: "letmeask".to_string(),
            default_filter: "warn".to_string(),
            console: true,
        }
    }
}

impl LogConfig {
    /// Default filter for a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn filter_for_verbosity(verbose: u8) -> &'static str {
        match verbose {
            0 => "warn",
            1 => "letmeask=info,letmeask_core=info",
            2 => "letmeask=debug,letmeask_core=debug",
            _ => "trace",
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns the path of the JSONL file when file logging is enabled.
///
/// # Errors
///
/// Returns `LetmeaskError::Io` if the log file cannot be opened or a
/// global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> LetmeaskResult<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let jsonl = config
        .logs_dir
        .as_ref()
        .map(|dir| JsonlLayer::new(dir, config.session.clone()))
        .transpose()?;
    let log_path = jsonl.as_ref().map(|layer| layer.log_path().to_path_buf());

    let console = config
        .console
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(jsonl)
        .with(console)
        .try_init()
        .map_err(|e| LetmeaskError::Io(std::io::Error::other(e)))?;

    Ok(log_path)
}
