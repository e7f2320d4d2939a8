//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the load balancer, outbound client and dispatcher from config
//! - Create the Axum router: `/v1/*`, `/health` and optional `/admin/*`
//! - Wire up middleware (request ID, tracing, client auth, panic recovery)
//! - Run the recovery sweep alongside the listener
//! - Drain in-flight requests on shutdown

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware,
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::admin;
use crate::config::{ConfigError, RouterConfig};
use crate::health::RecoverySweep;
use crate::http::handlers;
use crate::http::response::panic_response;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::Shutdown;
use crate::load_balancer::LoadBalancer;
use crate::proxy::{build_client, Dispatcher};
use crate::security::{require_api_key, ApiKeys};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub max_body_size: usize,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}

/// HTTP server for the model router.
pub struct HttpServer {
    config: RouterConfig,
    balancer: Arc<LoadBalancer>,
    dispatcher: Dispatcher,
}

impl HttpServer {
    pub fn new(config: RouterConfig) -> Result<Self, ServerError> {
        let balancer = Arc::new(LoadBalancer::from_config(&config)?);
        let client = build_client(&config.retry)?;
        let dispatcher = Dispatcher::new(balancer.clone(), client, &config.retry);

        tracing::info!(
            models = ?balancer.models(),
            max_attempts = config.retry.max_attempts,
            timeout_secs = config.retry.timeout_secs,
            policy = ?balancer.policy(),
            auth_enabled = config.auth.is_enabled(),
            admin_enabled = config.admin.enabled,
            "Router initialized"
        );

        Ok(Self {
            config,
            balancer,
            dispatcher,
        })
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Requests in flight are cancelled when `shutdown` is.
    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
            max_body_size: self.config.security.max_body_size,
            shutdown,
        };

        let mut api = Router::new()
            .route("/v1/chat/completions", post(handlers::chat_completions))
            .route("/v1/embeddings", post(handlers::embeddings))
            .route("/v1/responses", post(handlers::responses));

        if self.config.auth.is_enabled() {
            let keys = Arc::new(ApiKeys::new(&self.config.auth.keys));
            tracing::info!(keys = keys.len(), "Client API key authentication enabled");
            api = api.route_layer(middleware::from_fn_with_state(keys, require_api_key));
        }

        let mut app = Router::new()
            .route("/health", get(handlers::health))
            .merge(api)
            .with_state(state);

        if self.config.admin.enabled {
            app = app.merge(admin::router(
                self.balancer.clone(),
                self.config.admin.api_key.clone(),
            ));
        }

        app.layer(
            ServiceBuilder::new()
                .layer(set_request_id_layer())
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &Request| make_request_span(request))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(propagate_request_id_layer())
                .layer(CatchPanicLayer::custom(panic_response)),
        )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` triggers.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweep = RecoverySweep::new(
            self.balancer.clone(),
            self.config.health.sweep_interval(),
        )
        .spawn(shutdown.subscribe());

        let app = self.router(shutdown.subscribe());

        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.wait().await })
            .await?;

        shutdown.trigger();
        if let Err(e) = sweep.await {
            tracing::warn!(error = %e, "Recovery sweep task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
