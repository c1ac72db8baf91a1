//! Centralised tracing initialisation for avsctl binaries.
//!
//! Call [`init_tracing`] once at program start. Log lines go to stderr so
//! stdout carries only command output.
//!
//! Safe to call more than once; the global subscriber can only be set once
//! per process and later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Tool-specific filter variable, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "AVSCTL_LOG";

/// Filter directive: `AVSCTL_LOG`, then `RUST_LOG`, then `level`.
fn filter_directive(avsctl_log: Option<String>, rust_log: Option<String>, level: Level) -> String {
    avsctl_log
        .filter(|v| !v.trim().is_empty())
        .or_else(|| rust_log.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| level.as_str().to_ascii_lowercase())
}

/// Initialise the global tracing subscriber.
///
/// * `json` emits newline-delimited JSON records.
/// * `level` applies when neither `AVSCTL_LOG` nor `RUST_LOG` is set.
pub fn init_tracing(json: bool, level: Level) {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        level,
    );
    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
