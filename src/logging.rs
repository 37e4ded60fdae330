use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the global subscriber. Call once, after configuration is loaded.
///
/// `RUST_LOG` wins over `LOG_LEVEL` when both are set.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let subscriber_builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_target(false);

    if config.log_format == "json" {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}
