use crate::config::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system: console output plus, when a directory is
/// configured, a daily-rolling file.
///
/// Keep the returned guard alive for the life of the process so buffered
/// file output is flushed on exit.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    // Respect RUST_LOG if set; otherwise fall back to the configured filter
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stdout);

    let (file_layer, guard) = match &config.directory {
        Some(dir) if fs::create_dir_all(dir).is_ok() => {
            let file_appender = tracing_appender::rolling::daily(dir, &config.file_name);
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = if config.json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            };
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    // try_init: tests and embedders may already have a subscriber installed
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
