use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "NAVSYNC_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global fmt subscriber. Logs go to stderr so stdout stays a clean event
/// stream. A second call is a no-op.
pub fn init() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
