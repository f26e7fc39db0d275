use tracing_subscriber::EnvFilter;

/// Log filter comes from `CLASSPORTALD_LOG` (standard env-filter syntax),
/// defaulting to `info`. Output is stderr only.
pub fn init() {
    let filter =
        EnvFilter::try_from_env("CLASSPORTALD_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .try_init();
}
