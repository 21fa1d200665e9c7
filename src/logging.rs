use anyhow::Result;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;

/// Initialize structured logging.
///
/// Console output goes to stderr in the configured format; when a file path
/// is configured a daily-rolling JSON layer is added. The returned guard must
/// be held for the process lifetime or buffered file output is lost.
pub fn init_logging(config: &LoggingConfig, level_override: Option<&str>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            let level = level_override.unwrap_or(&config.level);
            EnvFilter::try_new(level)
        })
        .map_err(|e| anyhow::anyhow!("Failed to create log filter: {}", e))?;

    let registry = Registry::default().with(env_filter);

    let json_console = config.format == "json";
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!json_console)
        .with_target(true);

    let mut guard = None;
    if let Some(log_path) = config.file_path.as_deref().map(Path::new) {
        let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = log_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("pipeline.log");
        let file_appender = rolling::daily(dir, file_name);
        let (non_blocking_appender, appender_guard) = non_blocking(file_appender);
        guard = Some(appender_guard);

        if json_console {
            registry
                .with(console_layer.json())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .json(),
                )
                .init();
        } else {
            registry
                .with(console_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .json(),
                )
                .init();
        }
    } else if json_console {
        registry.with(console_layer.json()).init();
    } else {
        registry.with(console_layer).init();
    }

    info!("Logging system initialized");
    Ok(guard)
}

/// Performance timing utilities
pub struct OperationTimer {
    operation: String,
    start: std::time::Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: std::time::Instant::now(),
        }
    }

    pub fn finish(self) -> u128 {
        let duration = self.start.elapsed().as_millis();
        tracing::info!(
            operation = %self.operation,
            duration_ms = duration,
            "Operation completed"
        );
        duration
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            let duration = self.start.elapsed().as_millis();
            tracing::debug!(
                operation = %self.operation,
                duration_ms = duration,
                "Operation finished"
            );
        }
    }
}
