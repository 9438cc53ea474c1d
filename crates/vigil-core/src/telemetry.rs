//! Log output for the `vigil` binary.
//!
//! Diagnostics go to stderr through `tracing`; stdout is reserved for
//! command results, so `vigil --output json ...` can be piped straight into
//! another tool. `--json` switches the log lines themselves to JSON.
//!
//! `RUST_LOG` wins over the level chosen on the command line.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the process-wide subscriber writing to stderr.
///
/// Returns `false` when a subscriber was already installed; the earlier one
/// stays in place.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let (text_layer, json_layer) = if json {
        let layer = fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr);
        (None, Some(layer))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first_subscriber() {
        init_tracing(false, Level::WARN);
        assert!(!init_tracing(true, Level::DEBUG));
    }
}
