//! Error types for the SG6000 client.
//!
//! `Sg6000Error` covers every failure the library can surface:
//!
//! - **`Connection`**: the serial device could not be opened. Callers treat this
//!   as fatal; the driver is useless without its link.
//! - **`InvalidArgument`**: a value was rejected before anything reached the wire
//!   (non-finite frequency, empty state token, malformed sweep plan).
//! - **`Io`**: a write or flush on an open session failed, or the session was
//!   already closed.
//! - **`SweepAborted`**: a step of a running sweep failed. The instrument is left
//!   at whatever the last successful step set.
//! - **`Config`**: configuration could not be loaded or extracted.
//! - **`InvalidConfig`**: configuration loaded but holds unusable values, or
//!   logging could not be set up from it.
//!
//! A read timeout is deliberately *not* an error; queries return an empty string.

use thiserror::Error;

/// Convenience alias for results using [`Sg6000Error`].
pub type Result<T> = std::result::Result<T, Sg6000Error>;

/// Primary error type for the SG6000 client.
#[derive(Error, Debug)]
pub enum Sg6000Error {
    /// Serial device could not be opened (not found, permission denied, busy).
    #[error("Failed to open serial device '{device}': {source}")]
    Connection {
        /// Device path that was requested.
        device: String,
        /// Underlying transport error.
        #[source]
        source: std::io::Error,
    },

    /// Caller supplied a value that cannot be turned into a valid command.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O failure on an open session.
    #[error("Serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sweep step failed; remaining steps and repetitions were skipped.
    #[error(
        "Sweep aborted at repetition {repetition}, step {step} ({frequency_hz} Hz): {source}"
    )]
    SweepAborted {
        /// Zero-based repetition index.
        repetition: u32,
        /// Zero-based step index within the repetition.
        step: u64,
        /// Frequency the failing step tried to set.
        frequency_hz: f64,
        /// What went wrong.
        #[source]
        source: Box<Sg6000Error>,
    },

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration values failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Sg6000Error {
    /// Shorthand for building an [`Sg6000Error::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Shorthand for building an [`Sg6000Error::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for load and validation failures of the configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidConfig(_))
    }

    /// True for errors raised before any byte was written.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

impl From<figment::Error> for Sg6000Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
