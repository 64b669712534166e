//! Structured logging with tracing
//!
//! Sets up:
//! - Console logging, text or JSON
//! - Optional file logging with daily rotation (always JSON)
//! - Log level from RUST_LOG, falling back to the configured level

use super::config::{LogFormat, MonitoringConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the global tracing subscriber.
///
/// The returned guard must outlive the program's logging; dropping it stops
/// the file writer. `None` when file logging is off.
pub fn init_tracing(config: &MonitoringConfig) -> std::io::Result<Option<WorkerGuard>> {
    if !config.enabled {
        return Ok(None);
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let console_layer = config.enable_console_logging.then(|| {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true);
        match config.log_format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        }
    });

    let (file_layer, guard) = if config.enable_file_logging {
        config.ensure_log_dir()?;
        let file_appender = daily(&config.log_dir, "pathcache.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .with_writer(non_blocking_file)
            .with_ansi(false)
            .json()
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // A subscriber may already be installed (tests, embedding apps)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}

/// Log a request with structured fields
#[macro_export]
macro_rules! log_request {
    ($method:expr, $path:expr, $status:expr, $duration_ms:expr) => {
        tracing::info!(
            method = $method,
            path = $path,
            status = $status,
            duration_ms = $duration_ms,
            "API Request"
        );
    };
}
