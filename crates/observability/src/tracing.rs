//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered by `RUST_LOG`. Mediator spans use these
//! targets:
//!
//! - `mediator_infra::registry` registration and conflict warnings
//! - `mediator_infra::command_dispatcher` / `query_dispatcher` per-dispatch debug
//! - `mediator_infra::replay` replay summary and failures
//! - `mediator_events::log` per-append trace

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() -> bool {
    init_with_default(DEFAULT_FILTER)
}

/// Like [`init`], with a caller-chosen fallback filter.
///
/// Returns `true` if this call installed the subscriber.
pub fn init_with_default(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_target(true)
        .try_init()
        .is_ok()
}
