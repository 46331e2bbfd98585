//! The workload generator: a pool of rate-limited workers driving a [`Target`].
//!
//! The generator is a small state machine around a set of concurrently
//! running worker tasks. Starting it resets the metrics, spawns the
//! configured number of workers and returns immediately; stopping it signals
//! cooperative cancellation and waits for every in-flight operation to
//! finish. Reconfiguration is only allowed while stopped.
//!
//! Each worker owns its randomness source and is rate-limited independently
//! with an equal share of the aggregate rate target. Operation failures are
//! recorded and swallowed at the worker level; the pool never stops because
//! the target misbehaves.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkloadConfig;
use crate::error::{Error, Result};
use crate::metrics::{Collector, Snapshot};
use crate::target::{OperationCall, Target};

/// Drives a pool of concurrent workers issuing operations against a
/// [`Target`].
///
/// The generator owns the active [`WorkloadConfig`] and a shared
/// [`Collector`]; workers hold only shared references to both. All lifecycle
/// methods are safe to call from any task at any time.
#[derive(Debug)]
pub struct Generator {
    target: Arc<dyn Target>,
    collector: Arc<Collector>,
    config: Mutex<WorkloadConfig>,
    lifecycle: Arc<Lifecycle>,
    seed: u64,
}

/// Run state shared with the automatic-stop timer task.
#[derive(Debug, Default)]
struct Lifecycle {
    running: AtomicBool,
    run: Mutex<Run>,
}

/// State of the current run, recycled on every start.
#[derive(Debug, Default)]
struct Run {
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    /// Signals cancellation and waits for all workers of the current run.
    async fn stop(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::NotRunning);
        }

        let workers = {
            let mut run = self.run.lock().unwrap();
            run.token.cancel();
            std::mem::take(&mut run.workers)
        };

        for worker in workers {
            worker.await.ok();
        }

        tracing::info!("load generation stopped");
        Ok(())
    }
}

impl Generator {
    /// Creates a generator with the given target, configuration and
    /// collector.
    ///
    /// The configuration is used as-is; callers are expected to
    /// [`validate`](WorkloadConfig::validate) it first.
    pub fn new(target: Arc<dyn Target>, config: WorkloadConfig, collector: Arc<Collector>) -> Self {
        Self {
            target,
            collector,
            config: Mutex::new(config),
            lifecycle: Arc::new(Lifecycle::default()),
            seed: rand::random(),
        }
    }

    /// Fixes the base seed for the per-worker randomness sources.
    ///
    /// Worker `i` derives its own seed from the base, making operation
    /// selection reproducible across runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Starts the worker pool.
    ///
    /// Resets the metrics, creates a fresh cancellation token, spawns the
    /// configured number of workers and returns without waiting for them. If
    /// the config carries a nonzero duration, a stop is scheduled
    /// automatically after it elapses.
    pub fn start(&self) -> Result<()> {
        if self
            .lifecycle
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        self.collector.reset();

        let config = self.config.lock().unwrap().clone();

        // Hold the run lock until the new token and workers are registered,
        // so a concurrent stop cannot observe a half-started run.
        let mut run = self.lifecycle.run.lock().unwrap();
        let token = CancellationToken::new();
        let workers = (0..config.workers.max(1))
            .map(|index| {
                let worker = Worker {
                    target: Arc::clone(&self.target),
                    collector: Arc::clone(&self.collector),
                    config: config.clone(),
                    token: token.clone(),
                    rng: SmallRng::seed_from_u64(self.seed.wrapping_add(index as u64)),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        if !config.duration.is_zero() {
            let lifecycle = Arc::clone(&self.lifecycle);
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(config.duration) => {
                        let _ = lifecycle.stop().await;
                    }
                }
            });
        }

        run.token = token;
        run.workers = workers;
        drop(run);

        tracing::info!(
            rate = config.rate,
            workers = config.workers,
            "load generation started"
        );

        Ok(())
    }

    /// Stops the worker pool and waits for in-flight operations to drain.
    ///
    /// Cancellation is cooperative: workers stop before their next iteration,
    /// but an operation that is already talking to the target is allowed to
    /// finish. The drain itself has no timeout.
    pub async fn stop(&self) -> Result<()> {
        self.lifecycle.stop().await
    }

    /// Validates the given config and makes it the active one.
    ///
    /// Returns the applied config, with repaired scalar fields. Fails while
    /// the generator is running.
    pub fn update_config(&self, mut config: WorkloadConfig) -> Result<WorkloadConfig> {
        if self.is_running() {
            return Err(Error::InvalidState("update the configuration"));
        }

        config.validate()?;
        *self.config.lock().unwrap() = config.clone();

        Ok(config)
    }

    /// Returns a copy of the active configuration.
    pub fn config(&self) -> WorkloadConfig {
        self.config.lock().unwrap().clone()
    }

    /// Zeroes the collected metrics. Fails while the generator is running.
    pub fn reset_metrics(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidState("reset metrics"));
        }

        self.collector.reset();
        Ok(())
    }

    /// Returns a point-in-time snapshot of the collected metrics.
    pub fn metrics(&self) -> Snapshot {
        self.collector.snapshot()
    }

    /// Whether the generator is currently running.
    pub fn is_running(&self) -> bool {
        self.lifecycle.running.load(Ordering::SeqCst)
    }
}

/// A single worker of the pool.
struct Worker {
    target: Arc<dyn Target>,
    collector: Arc<Collector>,
    config: WorkloadConfig,
    token: CancellationToken,
    rng: SmallRng,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Worker {
    async fn run(mut self) {
        let mut ticker = rate_ticker(self.config.rate, self.config.workers);

        loop {
            if let Some(ticker) = &mut ticker {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
            } else if self.token.is_cancelled() {
                return;
            }

            let kind = self.config.mix.pick(&mut self.rng);
            let call = OperationCall {
                kind,
                isolation: self.config.isolation,
                batch_size: self.config.batch_size,
                rng: &mut self.rng,
            };

            let start = Instant::now();
            match self.target.execute(call).await {
                Ok(count) => self.collector.record_success(start.elapsed(), count),
                Err(err) => {
                    tracing::debug!(error = &err as &dyn std::error::Error, "operation failed");
                    self.collector.record_failure(err.units());
                }
            }
        }
    }
}

/// Creates the per-worker rate limiting ticker, or `None` for unlimited rate.
///
/// Each worker gets an equal share of the aggregate rate, floored at 1
/// operation per second of scheduling granularity. Missed ticks are skipped
/// instead of bursted.
fn rate_ticker(rate: i64, workers: i64) -> Option<tokio::time::Interval> {
    if rate <= 0 {
        return None;
    }

    let per_worker = (rate / workers.max(1)).clamp(1, i64::from(u32::MAX)) as u32;
    let period = Duration::from_secs(1) / per_worker;

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    Some(ticker)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use async_trait::async_trait;

    use crate::config::{IsolationLevel, OperationMix};
    use crate::target::TargetError;

    use super::*;

    #[derive(Debug, Default)]
    struct MockTarget {
        calls: AtomicU64,
        in_flight: AtomicU64,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl Target for MockTarget {
        async fn execute(&self, call: OperationCall<'_>) -> Result<u64, TargetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                return Err(TargetError::new(call.kind, 1, "injected failure"));
            }
            Ok(1)
        }
    }

    fn config() -> WorkloadConfig {
        WorkloadConfig {
            rate: 0,
            workers: 1,
            batch_size: 1,
            duration: Duration::ZERO,
            mix: OperationMix::single("mock"),
            isolation: IsolationLevel::ReadCommitted,
        }
    }

    fn generator(target: MockTarget, config: WorkloadConfig) -> Arc<Generator> {
        let target = Arc::new(target);
        let collector = Arc::new(Collector::new());
        Arc::new(Generator::new(target, config, collector).with_seed(1))
    }

    fn delaying_target() -> MockTarget {
        MockTarget {
            delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let generator = generator(delaying_target(), config());

        generator.start().unwrap();
        assert!(matches!(generator.start(), Err(Error::AlreadyRunning)));

        generator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent_but_reports_not_running() {
        let generator = generator(delaying_target(), config());

        assert!(matches!(generator.stop().await, Err(Error::NotRunning)));

        generator.start().unwrap();
        generator.stop().await.unwrap();
        assert!(matches!(generator.stop().await, Err(Error::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn update_config_is_rejected_while_running() {
        let generator = generator(delaying_target(), config());
        generator.start().unwrap();

        let update = generator.update_config(config());
        assert!(matches!(update, Err(Error::InvalidState(_))));

        generator.stop().await.unwrap();

        let mut updated = config();
        updated.rate = 42;
        generator.update_config(updated).unwrap();
        assert_eq!(generator.config().rate, 42);
    }

    #[tokio::test]
    async fn update_config_repairs_scalars_and_rejects_bad_mixes() {
        let generator = generator(delaying_target(), config());

        let mut repairable = config();
        repairable.workers = -3;
        let applied = generator.update_config(repairable).unwrap();
        assert_eq!(applied.workers, 1);

        let mut invalid = config();
        invalid.mix = OperationMix(vec![
            crate::config::OperationWeight::new("a", 60),
            crate::config::OperationWeight::new("b", 50),
        ]);
        assert!(matches!(
            generator.update_config(invalid),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_metrics_is_rejected_while_running() {
        let generator = generator(delaying_target(), config());
        generator.start().unwrap();

        assert!(matches!(
            generator.reset_metrics(),
            Err(Error::InvalidState(_))
        ));

        generator.stop().await.unwrap();
        generator.reset_metrics().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_rate_issues_back_to_back_operations() {
        let generator = generator(delaying_target(), config());

        generator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        generator.stop().await.unwrap();

        let snapshot = generator.metrics();
        assert!(snapshot.total > 0);
        assert_eq!(snapshot.total, snapshot.success);
        assert_eq!(snapshot.failure, 0);
        assert_eq!(snapshot.total, snapshot.success + snapshot.failure);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_target_only_grows_the_failure_counter() {
        let target = MockTarget {
            fail: true,
            delay: Duration::from_millis(1),
            ..Default::default()
        };
        let generator = generator(target, config());

        generator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(generator.is_running());
        generator.stop().await.unwrap();

        let snapshot = generator.metrics();
        assert_eq!(snapshot.success, 0);
        assert!(snapshot.failure > 0);
        assert_eq!(snapshot.total, snapshot.failure);
        assert!(!generator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_converges_to_the_target() {
        let mut cfg = config();
        cfg.rate = 10;
        let generator = generator(delaying_target(), cfg);

        generator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1050)).await;
        generator.stop().await.unwrap();

        let total = generator.metrics().total;
        assert!((8..=12).contains(&total), "got {total} operations");
    }

    #[tokio::test(start_paused = true)]
    async fn duration_stops_the_run_automatically() {
        let mut cfg = config();
        cfg.duration = Duration::from_millis(100);
        let generator = generator(delaying_target(), cfg);

        generator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!generator.is_running());
        assert!(matches!(generator.stop().await, Err(Error::NotRunning)));
        assert!(generator.metrics().total > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drains_in_flight_operations() {
        let target = Arc::new(MockTarget {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let collector = Arc::new(Collector::new());
        let generator = Arc::new(
            Generator::new(
                Arc::clone(&target) as Arc<dyn Target>,
                config(),
                collector,
            )
            .with_seed(1),
        );

        generator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        generator.stop().await.unwrap();

        assert_eq!(target.in_flight.load(Ordering::SeqCst), 0);
        assert!(target.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_the_metrics() {
        let generator = generator(delaying_target(), config());

        generator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        generator.stop().await.unwrap();
        assert!(generator.metrics().total > 0);

        generator.start().unwrap();
        let snapshot = generator.metrics();
        assert!(snapshot.total <= 1);
        generator.stop().await.unwrap();
    }
}
