//! Logging initialization (§6 `log.*` config, ambient stack).
//!
//! No OTLP export (see DESIGN.md); this crate wires up `tracing` with an
//! `EnvFilter` and a pretty or JSON formatter for local logging.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Initializes the global `tracing` subscriber. `default_directive` seeds the
/// `EnvFilter` when `RUST_LOG` is unset (e.g. `"rowpipe=info,tower_http=info"`).
pub fn init_telemetry(format: LogFormat, default_directive: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init()?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .try_init()?,
    }

    Ok(())
}
