use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber.
///
/// `RUST_LOG` wins over everything; otherwise `-v` selects `debug`, then the
/// configured filter, then `info`. Calling this twice keeps the first
/// subscriber.
pub fn init(configured: Option<&str>, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        configured.unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_ok() {
        tracing::debug!(level, "logging initialized");
    }
}
