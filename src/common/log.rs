use once_cell::sync::OnceCell;
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, reload};
use tracing_tree::HierarchicalLayer;

use crate::common::config::LogThreshold;

static FILTER: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

fn env_override() -> Option<EnvFilter> {
    std::env::var_os(EnvFilter::DEFAULT_ENV)?;
    EnvFilter::try_from_default_env().ok()
}

/// Installs the global subscriber. `RUST_LOG`, when set, wins over the
/// configured threshold for the lifetime of the process.
pub fn init_logging() {
    let filter = env_override()
        .unwrap_or_else(|| EnvFilter::new(LogThreshold::default().as_directive()));
    let (filter, handle) = reload::Layer::new(filter);

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            HierarchicalLayer::new(2)
                .with_writer(std::io::stderr)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .try_init();

    if result.is_ok() {
        let _ = FILTER.set(handle);
    }
}

pub fn set_threshold(threshold: LogThreshold) {
    if env_override().is_some() {
        return;
    }
    let Some(handle) = FILTER.get() else {
        return;
    };
    match handle.reload(EnvFilter::new(threshold.as_directive())) {
        Ok(()) => debug!("Log threshold is now {threshold}"),
        Err(e) => warn!("Could not change log threshold: {e}"),
    }
}
