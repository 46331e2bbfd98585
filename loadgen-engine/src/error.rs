//! Error types for the workload engine.

use thiserror::Error;

/// Errors returned by the [`Generator`](crate::Generator) lifecycle surface.
#[derive(Debug, Error)]
pub enum Error {
    /// The generator is already running.
    #[error("load generator is already running")]
    AlreadyRunning,

    /// The generator is not running.
    #[error("load generator is not running")]
    NotRunning,

    /// The requested action is not allowed while the generator is running.
    #[error("cannot {0} while the load generator is running")]
    InvalidState(&'static str),

    /// The submitted configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Shorthand for results with the engine's [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised when validating a [`WorkloadConfig`](crate::WorkloadConfig).
///
/// Out-of-range scalar fields are silently repaired instead and never show up
/// here; only a malformed operation mix is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The operation mix has no entries.
    #[error("operation mix must contain at least one operation")]
    EmptyMix,

    /// An operation mix weight is negative.
    #[error("operation mix weights must be non-negative")]
    NegativeWeight,

    /// The operation mix weights do not sum to 100.
    #[error("operation mix weights must sum to 100, got {0}")]
    MixSum(i64),
}
