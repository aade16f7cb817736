//! Tracing subscriber setup for processes embedding the coordinator

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
