//! Health check payloads.
//!
//! The health operation is unauthenticated and identical on both
//! transports: the RPC `HEALTHZ` message and `GET /healthz` return the
//! same payload.

use serde::{Deserialize, Serialize};

/// Reported service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthzRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthzResponse {
    pub status: ServiceStatus,
    /// Human-readable server time (`YYYY-MM-DD HH:MM:SS`).
    pub timestamp: String,
}
