//! A configurable, rate-limited, concurrent workload driver for PostgreSQL.
//!
//! The engine runs a pool of independent workers, each issuing transactional
//! operations against a [`Target`] at a controllable aggregate rate. Outcomes
//! and latencies are accumulated in a shared [`Collector`], which computes
//! throughput and latency percentiles on demand.
//!
//! Workloads are described by a [`WorkloadConfig`]: an overall rate target,
//! a worker count, an optional run duration, a weighted mix of operation
//! kinds, and the transaction isolation level to request. Read-heavy and
//! write-heavy workloads share the same engine; only the configured mix
//! differs.
//!
//! It is designed as a library crate to be used by the `loadgen-server`.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod target;

pub use crate::config::{IsolationLevel, OperationMix, OperationWeight, WorkloadConfig};
pub use crate::error::{ConfigError, Error};
pub use crate::generator::Generator;
pub use crate::metrics::{Collector, Snapshot};
pub use crate::target::{OperationCall, PgTarget, Target, TargetError};
