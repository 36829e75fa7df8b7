//! Logging setup.
//!
//! Logs go to stderr so they never interleave with command output on stdout.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "ARES_LOG";

/// Filter used when neither `ARES_LOG` nor the configuration sets one.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the log filter. `ARES_LOG` wins over `configured`.
///
/// Invalid directives fall back to [`DEFAULT_FILTER`].
#[must_use]
pub fn filter(configured: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }

    configured
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Later calls do nothing.
pub fn init(configured: Option<&str>) {
    let result = tracing_subscriber::registry()
        .with(filter(configured))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
