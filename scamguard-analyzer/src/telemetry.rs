//! Tracing subscriber setup for hosts embedding the analyzer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when neither `filter` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "scamguard_analyzer=info,scamguard_llm=info,warn";

/// Install a `fmt` subscriber, optionally emitting JSON lines.
///
/// `filter` wins over `RUST_LOG`. Returns false if a global subscriber was
/// already installed, which leaves that one in place.
pub fn init_tracing(filter: Option<&str>, json: bool) -> bool {
    let env_filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::info!(json, "Tracing initialized");
            true
        }
        Err(_) => false,
    }
}
