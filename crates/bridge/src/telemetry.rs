//! Telemetry initialisation for applications embedding the bridge.
//!
//! The bridge only emits `tracing` events. Installing a subscriber is left to
//! the embedding process; [`init`] is the stock choice: flattened JSON lines on
//! stdout, with the HTTP and TLS stacks held at `warn` so per-call bridge
//! events are not buried under connection chatter.
//!
//! # Telemetry invariants
//!
//! - **No credentials or request bodies** appear in any event field.
//! - Log level comes from configuration (default `info`); `RUST_LOG` overrides it.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Crates below the bridge that are capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: [&str; 3] = ["hyper", "hyper_util", "rustls"];

/// Initialise the global tracing subscriber at `log_level`.
///
/// # Errors
///
/// Returns an error if `log_level` is not a valid filter directive or a
/// global subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => default_filter(log_level)?,
    };

    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("nvp-bridge tracing subscriber already installed: {e}"))
}

fn default_filter(log_level: &str) -> Result<EnvFilter> {
    let mut directives = log_level.trim().to_owned();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    EnvFilter::try_new(&directives).with_context(|| format!("invalid log level {log_level:?}"))
}
