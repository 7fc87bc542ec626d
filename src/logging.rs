use tracing_subscriber::{fmt, EnvFilter};

/// Logs go to stderr so stdout carries nothing but the tailed journal entries.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
