//! The transactional execution surface the engine drives operations against.
//!
//! A [`Target`] executes one named operation kind as a scoped transaction and
//! reports how many units of work completed. The engine is agnostic to the
//! statement text behind an operation kind; it only tracks latencies and
//! success/failure outcomes.

use std::error::Error as StdError;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use thiserror::Error;

use crate::config::IsolationLevel;

mod postgres;

pub use self::postgres::PgTarget;

/// A single unit of work handed to a [`Target`].
#[derive(Debug)]
pub struct OperationCall<'a> {
    /// Name of the operation kind to execute.
    pub kind: &'a str,
    /// Isolation level to request for the transaction.
    pub isolation: IsolationLevel,
    /// Number of rows for batched operations.
    pub batch_size: i64,
    /// Randomness source for generated operation payloads.
    pub rng: &'a mut SmallRng,
}

/// Connection-pooled transactional execution surface.
///
/// Implementations own the transaction scope of an operation: begin, select
/// the isolation level, perform the work, and commit, rolling back on any
/// step failure.
#[async_trait]
pub trait Target: std::fmt::Debug + Send + Sync + 'static {
    /// Executes one operation, returning the number of completed units.
    async fn execute(&self, call: OperationCall<'_>) -> Result<u64, TargetError>;
}

/// An operation failure, carrying the number of units that failed with it.
#[derive(Debug, Error)]
#[error("{kind} operation failed")]
pub struct TargetError {
    kind: String,
    units: u64,
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl TargetError {
    /// Creates an error for a failed operation of the given kind.
    pub fn new(
        kind: impl Into<String>,
        units: u64,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            kind: kind.into(),
            units: units.max(1),
            source: source.into(),
        }
    }

    /// Number of work units that failed with this error.
    pub fn units(&self) -> u64 {
        self.units
    }
}
