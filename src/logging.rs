//! Tracing setup for the settlement service.
//!
//! `RUST_LOG` controls filtering (default `info`), e.g.
//! `RUST_LOG=blackbook_settlement=debug,tower_http=info`.
//! JSON output is meant for log aggregation, compact output for local runs.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Fails if one is already set.
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        registry.with(json_layer).try_init()
    } else {
        let compact_layer = tracing_subscriber::fmt::layer().compact().with_target(false);
        registry.with(compact_layer).try_init()
    }
}
