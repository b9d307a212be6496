use crate::config::AppConfig;
use crate::session::AUDIT_TARGET;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::filter::{FilterExt, filter_fn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keep alive for the whole run; dropping flushes the log files
pub struct LogGuards {
    _main: WorkerGuard,
    _audit: WorkerGuard,
}

fn appender(config: &AppConfig, file: &str) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, file),
        _ => tracing_appender::rolling::never(&config.log_dir, file),
    }
}

/// Operation log to stdout and `log_file`; full screen snapshots (the
/// `audit` target) only to `audit_file`.
pub fn init_logging(config: &AppConfig) -> LogGuards {
    let (main_writer, main_guard) = tracing_appender::non_blocking(appender(config, &config.log_file));
    let (audit_writer, audit_guard) =
        tracing_appender::non_blocking(appender(config, &config.audit_file));

    let level = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    let audit_layer = fmt::layer()
        .with_target(false)
        .with_writer(audit_writer)
        .with_ansi(false)
        .with_filter(filter_fn(|meta| meta.target() == AUDIT_TARGET));

    let registry = tracing_subscriber::registry().with(audit_layer);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true) // Keep target in JSON for structured queries
            .with_writer(main_writer)
            .with_ansi(false)
            .with_filter(level().and(filter_fn(|meta| meta.target() != AUDIT_TARGET)));
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(main_writer)
            .with_ansi(false)
            .with_filter(level().and(filter_fn(|meta| meta.target() != AUDIT_TARGET)));
        let stdout_layer = fmt::layer()
            .with_target(false)
            .with_ansi(true)
            .with_filter(level().and(filter_fn(|meta| meta.target() != AUDIT_TARGET)));
        registry.with(file_layer).with(stdout_layer).init();
    }

    LogGuards {
        _main: main_guard,
        _audit: audit_guard,
    }
}
