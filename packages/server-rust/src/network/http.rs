//! HTTP/JSON gateway.
//!
//! Assembles the axum router and the Tower middleware stack, and manages
//! the gateway lifecycle with the same deferred startup pattern as the RPC
//! module: `new()` allocates, `bind()` claims the port, `serve()` accepts
//! until the graceful-shutdown future resolves. The gateway depends on the
//! RPC listener already accepting connections — startup order is not
//! interchangeable.

use std::future::Future;

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use axum::routing::{get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{self, healthz_handler, AppState};
use crate::config::ServerConfig;

/// The composed Tower layer stack, outermost first.
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                TraceLayer<
                    tower_http::classify::SharedClassifier<
                        tower_http::classify::ServerErrorsAsFailures,
                    >,
                >,
                tower::layer::util::Stack<
                    SetRequestIdLayer<MakeRequestUuid>,
                    tower::layer::util::Identity,
                >,
            >,
        >,
    >,
>;

/// Transport-level middleware, outermost to innermost:
/// request-id assignment, tracing, CORS, timeout, request-id propagation
/// back onto the response.
fn build_http_layers(config: &ServerConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");
    let cors = build_cors_layer(&config.cors_origins);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|origin| origin.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Assembles the gateway router: the `/v1` REST surface, the health
/// check, and the JSON-string 404 fallback.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/v1/users",
            post(handlers::users::create_user).get(handlers::users::list_users),
        )
        .route("/v1/users/login", post(handlers::users::login))
        .route(
            "/v1/users/refresh-token",
            post(handlers::users::refresh_token),
        )
        .route(
            "/v1/users/change-password",
            post(handlers::users::change_password),
        )
        .route(
            "/v1/users/{userID}",
            put(handlers::users::update_user)
                .delete(handlers::users::delete_user)
                .get(handlers::users::get_user),
        )
        .route(
            "/v1/posts",
            post(handlers::posts::create_post)
                .get(handlers::posts::list_posts)
                .delete(handlers::posts::delete_posts),
        )
        .route(
            "/v1/posts/{postID}",
            put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post)
                .get(handlers::posts::get_post),
        )
        .fallback(handlers::not_found_handler)
        .layer(build_http_layers(config))
        .with_state(state)
}

/// The HTTP gateway lifecycle.
pub struct HttpModule {
    host: String,
    port: u16,
    router: Router,
    listener: Option<TcpListener>,
}

impl HttpModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: &ServerConfig, state: AppState) -> Self {
        Self {
            host: config.http_host.clone(),
            port: config.http_port,
            router: build_router(state, config),
            listener: None,
        }
    }

    /// Binds the listener, returning the actual port.
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound.
    pub async fn bind(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(%addr, port, "http gateway bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until the shutdown future resolves, then stops accepting and
    /// lets axum finish in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal I/O failure.
    ///
    /// # Panics
    ///
    /// Panics if `bind()` was not called first.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self.listener.expect("bind() must be called before serve()");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_http_layers_accepts_defaults() {
        let config = ServerConfig::default();
        let _layers = build_http_layers(&config);
    }

    #[test]
    fn cors_layer_accepts_wildcard_and_explicit_origins() {
        let _wild = build_cors_layer(&["*".to_string()]);
        let _explicit = build_cors_layer(&[
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ]);
    }
}
