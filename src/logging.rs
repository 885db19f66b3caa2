use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber; `RUST_LOG` wins over `default_filter`
///
/// Safe to call more than once: later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish()
        .try_init();
}
