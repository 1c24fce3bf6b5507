//! Server configuration types.

use std::time::Duration;

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the binary RPC listener.
    pub rpc_host: String,
    /// RPC port. 0 means OS-assigned.
    pub rpc_port: u16,
    /// Bind address for the HTTP gateway.
    pub http_host: String,
    /// HTTP port. 0 means OS-assigned.
    pub http_port: u16,
    /// HMAC key for signing identity tokens.
    pub jwt_key: String,
    /// Lifetime of issued identity tokens.
    pub token_expiration: Duration,
    /// Allowed CORS origins for the gateway.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a gateway request to complete.
    pub request_timeout: Duration,
    /// Grace period for draining in-flight calls at shutdown.
    pub shutdown_grace: Duration,
    /// Concurrency ceiling for per-row enrichment during list operations.
    pub list_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 0,
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
            jwt_key: "quill-dev-key-do-not-use-in-production".to_string(),
            token_expiration: Duration::from_secs(2 * 60 * 60),
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(30),
            list_concurrency: 8,
        }
    }
}
