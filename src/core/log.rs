use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const APP_TARGET: &str = "finanzguru";

/// Installs the global subscriber, writing to stderr so stdout only carries
/// command output. `verbose` turns on debug events for this crate; `RUST_LOG`
/// can narrow them further.
pub fn init_logging(verbose: bool) {
    let app_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(app_level.to_string().to_lowercase()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(Targets::new().with_target(APP_TARGET, app_level))
        .with(env_filter)
        .init();
}
