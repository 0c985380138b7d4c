//! Logging bootstrap for the native module.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber with `level` as the filter directive.
///
/// Falls back to `warn` when `level` does not parse. Returns `false` if a
/// subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        // Whichever test installs first wins; the second call must not panic.
        init_logging("mwa_core=debug,info");
        assert!(!init_logging("not a [valid filter"));
    }
}
