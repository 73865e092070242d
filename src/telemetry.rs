use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// JSON trace destination: `--trace-log` wins over `ZAPSTREAK_TRACE_LOG`.
pub fn tracing_log_path(config: &AppConfig) -> Option<PathBuf> {
    config
        .trace_log
        .clone()
        .or_else(|| env::var("ZAPSTREAK_TRACE_LOG").ok().map(PathBuf::from))
}

/// Install the global subscriber once. Human-readable lines go to stderr unless a
/// JSON trace file is configured.
pub fn init_tracing(config: &AppConfig) {
    if config.no_logs {
        return;
    }
    let level = config.log_level.as_level();

    let _ = TRACING_INIT.get_or_init(|| {
        if let Some(path) = tracing_log_path(config) {
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(err) => {
                    eprintln!("failed to open trace log {}: {err}", path.display());
                    return;
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        } else {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(UtcTime::rfc_3339())
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    });
}
