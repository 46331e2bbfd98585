//! Shared response types for the endpoint handlers.

use serde::Serialize;

/// Acknowledgement body for accepted control operations.
#[derive(Debug, Serialize)]
pub struct Accepted {
    /// What the operation did, e.g. `"started"`.
    pub status: &'static str,
}
