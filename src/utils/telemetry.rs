//! Structured logging setup.
//!
//! Component-tagged log lines (`[watcher]`, `[registry]`, ...) with
//! verbosity controlled by `RUST_LOG`.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LogFormat;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,trade_alert_bot=debug";

/// Initializes logging in the requested format.
///
/// Example RUST_LOG values:
/// - `info` - All info and above
/// - `trade_alert_bot=debug` - Debug for our crate, default for others
/// - `trade_alert_bot=trace,reqwest=warn` - Trace for us, warn for reqwest
pub fn init_telemetry(format: LogFormat) {
    match format {
        LogFormat::Compact => init_compact(),
        LogFormat::Json => init_json(),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn init_compact() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }
}
