//! Quill apiserver: starts the binary RPC listener, then the HTTP/JSON
//! gateway that forwards into it, and drains both on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quill_server::auth::{JwtTokenService, SaltedSha256Hasher, TokenService};
use quill_server::authz::AllowAll;
use quill_server::network::{AppState, HttpModule, RpcClient, RpcModule, ShutdownController};
use quill_server::service::RpcService;
use quill_server::store::{DataStore, MemoryBackend, StorageBackend};
use quill_server::ServerConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "quill-apiserver", version, about = "Quill blog/user backend")]
struct Cli {
    /// Bind host for the binary RPC listener.
    #[arg(long, env = "QUILL_RPC_HOST", default_value = "127.0.0.1")]
    rpc_host: String,

    /// Bind port for the binary RPC listener.
    #[arg(long, env = "QUILL_RPC_PORT", default_value_t = 6666)]
    rpc_port: u16,

    /// Bind host for the HTTP gateway.
    #[arg(long, env = "QUILL_HTTP_HOST", default_value = "127.0.0.1")]
    http_host: String,

    /// Bind port for the HTTP gateway.
    #[arg(long, env = "QUILL_HTTP_PORT", default_value_t = 5555)]
    http_port: u16,

    /// HMAC key for identity tokens.
    #[arg(
        long,
        env = "QUILL_JWT_KEY",
        default_value = "quill-dev-key-do-not-use-in-production"
    )]
    jwt_key: String,

    /// Identity token lifetime in seconds.
    #[arg(long, env = "QUILL_TOKEN_EXPIRATION_SECS", default_value_t = 7200)]
    token_expiration_secs: u64,

    /// Grace period in seconds for draining in-flight calls.
    #[arg(long, env = "QUILL_SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    shutdown_grace_secs: u64,

    /// PostgreSQL connection URL. Without it the in-memory engine is used.
    #[cfg(feature = "postgres")]
    #[arg(long, env = "QUILL_DATABASE_URL")]
    database_url: Option<String>,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            rpc_host: self.rpc_host.clone(),
            rpc_port: self.rpc_port,
            http_host: self.http_host.clone(),
            http_port: self.http_port,
            jwt_key: self.jwt_key.clone(),
            token_expiration: Duration::from_secs(self.token_expiration_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            ..ServerConfig::default()
        }
    }

    async fn backend(&self) -> anyhow::Result<Arc<dyn StorageBackend>> {
        #[cfg(feature = "postgres")]
        if let Some(url) = &self.database_url {
            let backend = quill_server::store::postgres::PostgresBackend::connect(url)
                .await
                .map_err(|err| anyhow::anyhow!("{err}"))?;
            info!("using postgres storage");
            return Ok(Arc::new(backend));
        }
        info!("using in-memory storage");
        Ok(Arc::new(MemoryBackend::new()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.server_config();

    let store = DataStore::initialize(cli.backend().await?);
    let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(
        &config.jwt_key,
        config.token_expiration,
    ));
    let service = Arc::new(RpcService::new(
        store,
        tokens,
        Arc::new(SaltedSha256Hasher),
        Arc::new(AllowAll),
        &config,
    ));
    let shutdown = Arc::new(ShutdownController::new());

    // The gateway dials the RPC listener, so the RPC side must be
    // accepting before the HTTP side starts.
    let mut rpc = RpcModule::new(
        config.rpc_host.clone(),
        config.rpc_port,
        service,
        Arc::clone(&shutdown),
    );
    let rpc_port = rpc.bind().await?;
    let rpc_task = tokio::spawn(rpc.serve());

    let client = Arc::new(RpcClient::connect(&format!("{}:{rpc_port}", config.rpc_host)).await?);
    let state = AppState {
        client,
        shutdown: Arc::clone(&shutdown),
    };
    let mut http = HttpModule::new(&config, state);
    http.bind().await?;

    shutdown.set_ready();
    info!("quill apiserver ready");

    // Ctrl-c stops the gateway from accepting; axum finishes in-flight
    // HTTP requests before serve() returns.
    http.serve(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await?;

    // Gateway is down; now stop the RPC listener and drain.
    shutdown.trigger_shutdown();
    if !shutdown.wait_for_drain(config.shutdown_grace).await {
        warn!("grace period expired with calls still in flight");
    }
    let _ = rpc_task.await;
    info!("quill apiserver stopped");
    Ok(())
}
