use tracing_subscriber::{fmt, EnvFilter};

/// install the global subscriber.
///
/// `RUST_LOG` wins when set, otherwise `level` from the config file
/// (e.g. "info", "enviro_host=debug").
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .compact()
        .try_init();

    if let Err(e) = result {
        tracing::warn!("Logging already initialised: {}", e);
    }
}
