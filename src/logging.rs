/// Initialize logging for binaries.
///
/// Defaults to `error` level unless overridden by `DEMOVOICE_LOG`. Output
/// goes to standard error; standard output is reserved for the progress
/// lines and, ultimately, the WAV files' paths.
#[cfg(feature = "logging")]
pub fn init() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::builder()
        .with_env_var("DEMOVOICE_LOG")
        .with_default_directive(tracing::level_filters::LevelFilter::ERROR.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

/// Initialize logging when the `logging` feature is not enabled.
///
/// Kept as a no-op so library consumers can call `demovoice::logging::init()`
/// without pulling in `tracing-subscriber`.
#[cfg(not(feature = "logging"))]
pub fn init() {}
