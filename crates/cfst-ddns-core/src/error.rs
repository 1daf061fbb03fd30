//! Error types for the DDNS updater
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS updater
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing credentials, empty hostname list, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The speed-test step failed to produce a results file
    #[error("Measurement error: {0}")]
    Measurement(String),

    /// Fewer ranked candidates than hostnames; the pass touched nothing
    #[error("Insufficient candidates: need {need}, have {have}")]
    InsufficientCandidates {
        /// Number of candidates read from the results file
        have: usize,
        /// Number of hostnames to bind
        need: usize,
    },

    /// I/O errors (results file, child process spawning)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a measurement error
    pub fn measurement(msg: impl Into<String>) -> Self {
        Self::Measurement(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborts a whole pass before any record is touched,
    /// rather than failing a single hostname
    pub fn is_pass_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Measurement(_) | Self::InsufficientCandidates { .. }
        )
    }
}
