use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber writing to `log_file` (truncated), and to
/// stderr as well when `foreground` is set. `RUST_LOG` overrides the default
/// `info` filter.
///
/// Keep the returned guard alive; dropping it flushes and stops the writer.
pub fn init_logging(log_file: &Path, foreground: bool) -> Result<WorkerGuard> {
    let file = File::create(log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;
    let (file_writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_env_filter(filter);

    let result = if foreground {
        builder
            .with_writer(file_writer.and(std::io::stderr))
            .try_init()
    } else {
        builder.with_writer(file_writer).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    Ok(guard)
}

/// Stderr-only logging for the admin subcommands and as a fallback when the
/// log file cannot be opened.
pub fn init_stderr_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
