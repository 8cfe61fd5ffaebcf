//! Portcullis Gateway Core
//!
//! Security-and-configuration core for a federated API gateway.
//!
//! # Features
//!
//! - **Topology Model**: immutable routing/provider graph, one per deployment
//! - **Multi-Dialect Loader**: two XML descriptor dialects normalized into the
//!   same semantic model via declarative rule tables
//! - **Token Federation**: per-request bearer-credential gate checking
//!   signature (via a pluggable authority), expiry and audience
//! - **Atomic Reload**: topologies are replaced wholesale, never edited in
//!   place, so in-flight requests always see a consistent snapshot
//!
//! The HTTP listener, the proxy dispatch engine and the signing primitives
//! live outside this crate; the filter plugs into axum as middleware and the
//! authority is a trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod federation;
pub mod topology;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
