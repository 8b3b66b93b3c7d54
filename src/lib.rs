pub mod cli;
pub mod config;
pub mod dataset;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialise logging to stderr. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
}
