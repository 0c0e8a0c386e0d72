use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directory for rolling log files: `$REFSCOPE_LOG_DIR`, else `~/.refscope/logs`.
pub fn log_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("REFSCOPE_LOG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".refscope/logs")
}

pub fn init_logging(component: &str, to_stderr: bool) -> WorkerGuard {
    init_logging_in(&log_dir(), component, to_stderr)
}

/// Like [`init_logging`], writing below `log_dir`.
pub fn init_logging_in(log_dir: &Path, component: &str, to_stderr: bool) -> WorkerGuard {
    let _ = std::fs::create_dir_all(log_dir);

    // Files are named `<component>.log.<date>`
    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{component}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    // A host may already have installed a subscriber.
    if to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);
        let _ = registry.with(stderr_layer).try_init();
    } else {
        let _ = registry.try_init();
    }

    guard
}
