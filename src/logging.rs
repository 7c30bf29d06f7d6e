use tracing_subscriber::EnvFilter;

/// Logs to stderr at the level given by RUST_LOG, "info" when unset.
pub fn init() {
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}
