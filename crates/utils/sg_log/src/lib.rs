//! Logging setup for store-gateway binaries and tests.
//!
//! This crate deliberately does very little: it configures a `tracing-subscriber` formatting
//! layer driven by `RUST_LOG` (falling back to `info` for this crate's own spans), the way the
//! teacher's server-side crates set up their `tracing`-based telemetry stack (as distinct from
//! the viewer's `log` + `puffin` stack, which has no bearing on a headless server).

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber. Safe to call more than once; later calls are no-ops.
///
/// `default_directive` is used when `RUST_LOG` is unset, e.g. `"store_gateway=info,warn"`.
pub fn setup_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive.to_owned()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    // `set_global_default` fails if a subscriber is already installed; that's fine for tests
    // that call this repeatedly.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
