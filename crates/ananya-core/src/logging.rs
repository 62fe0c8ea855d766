//! Structured logging bootstrap with `tracing`.
//!
//! [`init_subscriber`] installs the global subscriber once at startup.
//! `RUST_LOG` takes precedence over the configured level when set.

use tracing_subscriber::EnvFilter;

/// Output format for the global subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact human-readable lines.
    Compact,
    /// One JSON object per line.
    Json,
}

/// Build the filter used by the subscriber.
///
/// Falls back to `info` when `level` is not a valid directive.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Subsequent calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = build_filter(level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails only when a global subscriber already exists.
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_is_idempotent() {
        init_subscriber("debug", LogFormat::Compact);
        init_subscriber("info", LogFormat::Json);
    }

    #[test]
    fn invalid_level_falls_back() {
        let filter = build_filter("not a [valid directive");
        assert!(!filter.to_string().is_empty());
    }
}
