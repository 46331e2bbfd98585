//! The load generator control server.
//!
//! This builds on top of [`loadgen_engine`] and exposes the generator's
//! start/stop/configure/metrics contract as an HTTP API.
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    loadgen_server::cli::execute()
}
