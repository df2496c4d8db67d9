//! Structured logging init, lifted from `eustress-backend::main`'s
//! `tracing_subscriber::registry()...init()` bootstrap.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global `tracing` subscriber reading level filters from
/// `RUST_LOG`, defaulting to `info` when unset. Call once, at process
/// startup (`tile3d-backend`'s and `tile3d-cli`'s `main`); library crates
/// never call this themselves.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
