//! Workload configuration and validation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Describes the workload the generator should drive.
///
/// A config is validated with [`validate`](Self::validate) before it becomes
/// active, and can only be replaced while the generator is stopped.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Target operations per second across all workers; 0 means unlimited.
    pub rate: i64,

    /// Number of concurrent workers.
    pub workers: i64,

    /// Rows per batch insert operation.
    pub batch_size: i64,

    /// How long to run before stopping automatically; zero runs until
    /// explicitly stopped.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Relative weights of the operation kinds, in percent.
    pub mix: OperationMix,

    /// Transaction isolation level requested for every operation.
    #[serde(with = "display_fromstr")]
    pub isolation: IsolationLevel,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            rate: 1000,
            workers: 10,
            batch_size: 1,
            duration: Duration::ZERO,
            mix: OperationMix(vec![
                OperationWeight::new("simple_read", 60),
                OperationWeight::new("filtered_read", 30),
                OperationWeight::new("aggregate_read", 10),
            ]),
            isolation: IsolationLevel::ReadCommitted,
        }
    }
}

impl WorkloadConfig {
    /// Repairs out-of-range scalar fields and rejects invalid operation mixes.
    ///
    /// Scalars are coerced to the nearest valid value: a negative rate
    /// becomes unlimited, and worker and batch counts are raised to 1. A
    /// malformed mix is a caller bug and is rejected instead of repaired.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.rate < 0 {
            self.rate = 0;
        }
        if self.workers < 1 {
            self.workers = 1;
        }
        if self.batch_size < 1 {
            self.batch_size = 1;
        }

        self.mix.validate()
    }
}

/// Ordered mapping of operation kinds to their relative weight in percent.
///
/// Declared order is significant: operations are selected by walking the
/// cumulative weight bounds in order, so entries with a zero weight are never
/// selected and earlier entries absorb rounding from the uniform draw.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct OperationMix(pub Vec<OperationWeight>);

/// A single entry of an [`OperationMix`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct OperationWeight {
    /// Name of the operation kind.
    pub kind: String,
    /// Relative weight in percent.
    pub weight: i64,
}

impl OperationWeight {
    /// Creates a mix entry for the given kind and weight.
    pub fn new(kind: impl Into<String>, weight: i64) -> Self {
        Self {
            kind: kind.into(),
            weight,
        }
    }
}

impl OperationMix {
    /// Creates a mix that always selects a single operation kind.
    pub fn single(kind: impl Into<String>) -> Self {
        Self(vec![OperationWeight::new(kind, 100)])
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            return Err(ConfigError::EmptyMix);
        }
        if self.0.iter().any(|entry| entry.weight < 0) {
            return Err(ConfigError::NegativeWeight);
        }

        let total: i64 = self.0.iter().map(|entry| entry.weight).sum();
        if self.0.len() > 1 && total != 100 {
            return Err(ConfigError::MixSum(total));
        }

        Ok(())
    }

    /// Selects an operation kind with a cumulative weight walk over a uniform
    /// draw in `[0, 100)`.
    pub(crate) fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        let draw = rng.random_range(0..100);

        let mut bound = 0;
        for entry in &self.0 {
            bound += entry.weight;
            if draw < bound {
                return &entry.kind;
            }
        }

        // A single-kind mix may sum below 100; fall through to the last kind.
        match self.0.last() {
            Some(entry) => &entry.kind,
            None => "",
        }
    }
}

/// Transaction isolation level requested from the target for every operation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum IsolationLevel {
    /// PostgreSQL's default `READ COMMITTED` level.
    #[default]
    ReadCommitted,
    /// The `REPEATABLE READ` level.
    RepeatableRead,
    /// The `SERIALIZABLE` level.
    Serializable,
}

impl IsolationLevel {
    /// The SQL spelling used in `SET TRANSACTION ISOLATION LEVEL ...`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = std::convert::Infallible;

    // Unrecognized spellings normalize to the default instead of failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s {
            s if s.eq_ignore_ascii_case("READ COMMITTED") => IsolationLevel::ReadCommitted,
            s if s.eq_ignore_ascii_case("REPEATABLE READ") => IsolationLevel::RepeatableRead,
            s if s.eq_ignore_ascii_case("SERIALIZABLE") => IsolationLevel::Serializable,
            _ => IsolationLevel::default(),
        };

        Ok(level)
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn repairs_out_of_range_scalars() {
        let mut config = WorkloadConfig {
            rate: -5,
            workers: 0,
            batch_size: -1,
            ..Default::default()
        };

        config.validate().unwrap();

        assert_eq!(config.rate, 0);
        assert_eq!(config.workers, 1);
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn rejects_mix_not_summing_to_100() {
        let mut config = WorkloadConfig {
            mix: OperationMix(vec![
                OperationWeight::new("a", 60),
                OperationWeight::new("b", 50),
            ]),
            ..Default::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::MixSum(110)));
    }

    #[test]
    fn accepts_mix_summing_to_100() {
        let mut config = WorkloadConfig {
            mix: OperationMix(vec![
                OperationWeight::new("a", 60),
                OperationWeight::new("b", 40),
            ]),
            ..Default::default()
        };

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_negative_weights() {
        let mut config = WorkloadConfig {
            mix: OperationMix(vec![
                OperationWeight::new("a", 150),
                OperationWeight::new("b", -50),
            ]),
            ..Default::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::NegativeWeight));
    }

    #[test]
    fn rejects_empty_mix() {
        let mut config = WorkloadConfig {
            mix: OperationMix(vec![]),
            ..Default::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::EmptyMix));
    }

    #[test]
    fn single_kind_mix_ignores_the_sum_rule() {
        let mut config = WorkloadConfig {
            mix: OperationMix(vec![OperationWeight::new("only", 1)]),
            ..Default::default()
        };

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn pick_honors_weights_and_order() {
        let mix = OperationMix(vec![
            OperationWeight::new("never", 0),
            OperationWeight::new("always", 100),
        ]);

        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(mix.pick(&mut rng), "always");
        }
    }

    #[test]
    fn pick_is_reproducible_under_a_fixed_seed() {
        let mix = OperationMix(vec![
            OperationWeight::new("a", 60),
            OperationWeight::new("b", 30),
            OperationWeight::new("c", 10),
        ]);

        let sequence = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            (0..100).map(|_| mix.pick(&mut rng).to_owned()).collect::<Vec<_>>()
        };

        assert_eq!(sequence(42), sequence(42));
    }

    #[test]
    fn pick_falls_back_to_the_last_kind_of_an_underweighted_mix() {
        let mix = OperationMix(vec![OperationWeight::new("only", 1)]);

        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            assert_eq!(mix.pick(&mut rng), "only");
        }
    }

    #[test]
    fn unknown_isolation_level_normalizes_to_read_committed() {
        let level: IsolationLevel = "SNAPSHOT".parse().unwrap();
        assert_eq!(level, IsolationLevel::ReadCommitted);

        let level: IsolationLevel = "repeatable read".parse().unwrap();
        assert_eq!(level, IsolationLevel::RepeatableRead);
    }

    #[test]
    fn deserializes_from_json() {
        let config: WorkloadConfig = serde_json::from_str(
            r#"{
                "rate": 500,
                "workers": 4,
                "duration": "30s",
                "mix": [
                    {"kind": "simple_read", "weight": 70},
                    {"kind": "batch_insert", "weight": 30}
                ],
                "isolation": "SERIALIZABLE"
            }"#,
        )
        .unwrap();

        assert_eq!(config.rate, 500);
        assert_eq!(config.workers, 4);
        assert_eq!(config.duration, Duration::from_secs(30));
        assert_eq!(config.mix.0.len(), 2);
        assert_eq!(config.isolation, IsolationLevel::Serializable);
    }
}
