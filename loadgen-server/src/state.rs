//! Shared server state.

use std::sync::Arc;

use loadgen_engine::{Collector, Generator, PgTarget};

use crate::config::Config;

/// Shared reference to the server [state](State).
pub type ServiceState = Arc<State>;

/// Reference to the load generation business logic.
///
/// This structure is created during server startup and shared with all HTTP
/// request handlers. In request handlers, use
/// `axum::extract::State<ServiceState>` to retrieve a shared reference to
/// this structure.
#[derive(Debug)]
pub struct State {
    /// The server configuration.
    pub config: Config,
    /// The workload generator driving the database target.
    pub generator: Arc<Generator>,
}

impl State {
    /// Connects the database target and creates the shared server state.
    pub async fn new(config: Config) -> anyhow::Result<ServiceState> {
        let mut workload = config.workload.clone();
        workload.validate()?;

        tracing::info!("connecting to PostgreSQL");
        let target =
            PgTarget::connect(&config.database.url, config.database.max_connections).await?;

        let collector = Arc::new(Collector::new());
        let generator = Arc::new(Generator::new(Arc::new(target), workload, collector));

        Ok(Arc::new(Self { config, generator }))
    }
}
