// Tracing initialization for the CLI. Logs go to stderr so command output stays clean.
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    // Prefer RUST_LOG from env unless --verbose was given.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .filter(|_| !verbose)
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
