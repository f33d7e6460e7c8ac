//! Log setup for the `presubmit` binary.
//!
//! Logs go to stderr so they never interleave with the result protocol on
//! stdout. Targets are kept in the output: `presubmit::script` carries the
//! `print`/`debug` output of verification scripts, everything else is the
//! engine's own lifecycle.
//!
//! Filter directives come from `PRESUBMIT_LOG`, then `RUST_LOG`, then the
//! level passed to [`init_tracing`].

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "PRESUBMIT_LOG";

/// Build the filter from the first set of directives that parses, falling
/// back to `level`.
fn env_filter(directives: impl IntoIterator<Item = Option<String>>, level: Level) -> EnvFilter {
    directives
        .into_iter()
        .flatten()
        .find_map(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber; `json` selects newline-delimited JSON.
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = env_filter(
        [std::env::var(LOG_ENV).ok(), std::env::var("RUST_LOG").ok()],
        level,
    );
    let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .ok();
    }
}
