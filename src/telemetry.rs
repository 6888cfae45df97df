use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Initialize structured JSON logging to stdout.
/// `RUST_LOG` controls the level; defaults to `info`.
/// `log` records from the request middleware are forwarded into the same
/// subscriber.
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(formatting_layer)
        .init();
}

/// Test-friendly variant: a no-op if a subscriber is already installed
pub fn try_init_telemetry() -> bool {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(formatting_layer)
        .try_init()
        .is_ok()
}
