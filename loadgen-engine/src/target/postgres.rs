//! PostgreSQL implementation of the [`Target`] surface.
//!
//! Operations run against a `logs` table and model a logging workload: one
//! batched insert kind and three read kinds of increasing planner cost. Every
//! operation is a scoped transaction with the requested isolation level; a
//! transaction that is dropped without commit is rolled back by the pool.

use async_trait::async_trait;
use rand::Rng;
use rand::rngs::SmallRng;
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::Transaction;

use crate::config::IsolationLevel;
use crate::target::{OperationCall, Target, TargetError};

/// Log levels used for generated rows and filter predicates.
const LEVELS: &[&str] = &["INFO", "WARN", "ERROR", "DEBUG"];

/// Service names used for generated rows and filter predicates.
const SERVICES: &[&str] = &[
    "auth",
    "api",
    "worker",
    "scheduler",
    "notification",
    "payment",
];

/// Message bodies used for generated rows.
const MESSAGES: &[&str] = &[
    "Request processed successfully",
    "Database connection established",
    "Cache invalidated",
    "Task completed",
    "User authentication verified",
    "Payment transaction initiated",
    "Email notification sent",
    "API rate limit checked",
];

/// A [`Target`] backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgTarget {
    pool: PgPool,
}

impl PgTarget {
    /// Creates a target on top of an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool of the given size to the database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Begins a transaction with the requested isolation level.
    async fn begin(
        &self,
        isolation: IsolationLevel,
    ) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let set_isolation = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.as_sql());
        sqlx::query(&set_isolation).execute(&mut *tx).await?;

        Ok(tx)
    }

    async fn batch_insert(
        &self,
        isolation: IsolationLevel,
        batch_size: i64,
        rng: &mut SmallRng,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.begin(isolation).await?;

        let sql = batch_insert_sql(batch_size);
        let mut query = sqlx::query(&sql);
        for _ in 0..batch_size {
            query = query
                .bind(pick(rng, LEVELS))
                .bind(pick(rng, SERVICES))
                .bind(pick(rng, MESSAGES))
                .bind(random_metadata(rng));
        }
        query.execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(batch_size as u64)
    }

    async fn simple_read(&self, isolation: IsolationLevel) -> Result<u64, sqlx::Error> {
        let mut tx = self.begin(isolation).await?;

        sqlx::query(
            "SELECT id, timestamp, level, service, message \
             FROM logs \
             ORDER BY timestamp DESC \
             LIMIT 100",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(1)
    }

    async fn filtered_read(
        &self,
        isolation: IsolationLevel,
        rng: &mut SmallRng,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.begin(isolation).await?;

        sqlx::query(
            "SELECT id, timestamp, level, service, message \
             FROM logs \
             WHERE level = $1 \
               AND service = $2 \
               AND timestamp > NOW() - INTERVAL '1 hour' \
             ORDER BY timestamp DESC \
             LIMIT 100",
        )
        .bind(pick(rng, LEVELS))
        .bind(pick(rng, SERVICES))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(1)
    }

    async fn aggregate_read(&self, isolation: IsolationLevel) -> Result<u64, sqlx::Error> {
        let mut tx = self.begin(isolation).await?;

        sqlx::query(
            "SELECT level, COUNT(*) AS count, \
                    MIN(timestamp) AS first_seen, MAX(timestamp) AS last_seen \
             FROM logs \
             WHERE timestamp > NOW() - INTERVAL '1 hour' \
             GROUP BY level \
             ORDER BY count DESC",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(1)
    }
}

#[async_trait]
impl Target for PgTarget {
    async fn execute(&self, call: OperationCall<'_>) -> Result<u64, TargetError> {
        let OperationCall {
            kind,
            isolation,
            batch_size,
            rng,
        } = call;

        match kind {
            "batch_insert" => self
                .batch_insert(isolation, batch_size, rng)
                .await
                .map_err(|err| TargetError::new(kind, batch_size as u64, err)),
            "simple_read" => self
                .simple_read(isolation)
                .await
                .map_err(|err| TargetError::new(kind, 1, err)),
            "filtered_read" => self
                .filtered_read(isolation, rng)
                .await
                .map_err(|err| TargetError::new(kind, 1, err)),
            "aggregate_read" => self
                .aggregate_read(isolation)
                .await
                .map_err(|err| TargetError::new(kind, 1, err)),
            _ => Err(TargetError::new(
                kind,
                1,
                format!("unknown operation kind: {kind}"),
            )),
        }
    }
}

/// Builds a multi-row `INSERT` with numbered placeholders for `rows` rows.
fn batch_insert_sql(rows: i64) -> String {
    let mut sql = String::from("INSERT INTO logs (level, service, message, metadata) VALUES ");
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        let offset = row * 4;
        sql.push_str(&format!(
            "(${}, ${}, ${}, ${})",
            offset + 1,
            offset + 2,
            offset + 3,
            offset + 4
        ));
    }

    sql
}

fn pick<'a>(rng: &mut SmallRng, values: &'a [&'a str]) -> &'a str {
    values[rng.random_range(0..values.len())]
}

fn random_metadata(rng: &mut SmallRng) -> String {
    format!(
        r#"{{"request_id": {}, "user_id": {}, "duration_ms": {}}}"#,
        rng.random_range(0..1_000_000),
        rng.random_range(0..10_000),
        rng.random_range(0..1000),
    )
}
