// Tracing initialization with a configurable and reloadable log level.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // Prefer RUST_LOG from env, otherwise use provided level string.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Apply the configured logging level unless RUST_LOG overrides it.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing::debug!(level, "RUST_LOG set; ignoring logging.level");
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}
