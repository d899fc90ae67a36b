//! Tracing subscriber setup for the command-line tool

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive for the given verbosity
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "hoi4_radio_dl=debug,info"
    } else {
        "info"
    }
}

/// Install a compact stderr subscriber
///
/// `RUST_LOG` overrides the verbosity-derived default. Logs go to stderr so
/// relayed tool output on stdout stays readable. Calling this twice is harmless.
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init()
        .ok();
}
