//! Log sink selection.
//!
//! The destination is chosen once at startup: the run log file under `LOGDIR` alone, or
//! that file and the terminal. Report lines and diagnostics all go through `tracing`, so switching
//! the sink never requires swapping process-wide output streams.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Where log records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    /// The run log file plus stdout
    Both(PathBuf),
}

impl LogSink {
    pub fn file(&self) -> &Path {
        match self {
            LogSink::File(path) | LogSink::Both(path) => path,
        }
    }

    pub fn console(&self) -> bool {
        matches!(self, LogSink::Both(_))
    }
}

/// Keeps the background file writer alive; drop it only at exit so buffered lines flush
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Default filter when `RUST_LOG` is not set
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "ecr_pruner=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber for `sink`
pub fn init_logging(sink: &LogSink, debug: bool) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let path = sink.file();
    let (dir, name) = split_log_path(path)?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);

    let console_layer = sink.console().then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    tracing::info!("Logging initialized. Log file: {}", path.display());

    Ok(LogGuard { _file: guard })
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr)> {
    let name = path
        .file_name()
        .with_context(|| format!("Log path {} has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir, name))
}
