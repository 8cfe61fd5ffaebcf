//! Error types for the gateway core

use std::io;

use thiserror::Error;

/// Result type alias for the gateway core
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway core errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A topology descriptor could not be turned into a valid topology.
    ///
    /// Covers malformed markup, unsupported dialects and invariant
    /// violations (a service with no role, a service with no urls). A failed
    /// load never yields a partially populated topology.
    #[error("Failed to parse descriptor '{descriptor}': {detail}")]
    Parse {
        /// Descriptor name or path, for diagnostics
        descriptor: String,
        /// What went wrong
        detail: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a parse error for the named descriptor
    pub fn parse(descriptor: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            descriptor: descriptor.into(),
            detail: detail.into(),
        }
    }
}
