//! Logging setup for the `pulse` binary.
//!
//! Filter precedence: `PULSE_LOG`, then `RUST_LOG`, then `verbosity`.
//! Output goes to stderr so stdout stays clean for reports.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "PULSE_LOG";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Install the global subscriber. Calling it again is a no-op.
pub fn init(verbosity: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(verbosity));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Level implied by the number of `-v` flags.
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => DEFAULT_LOG_LEVEL,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "trace");
    }

    #[test]
    fn init_twice_is_harmless() {
        init("warn");
        init("debug");
    }
}
