//! HTTP server setup.
//!
//! The pipeline is declared in one place, outermost stage first:
//!
//! ```text
//! trace span → security headers → CORS → request id → error renderer
//!   → panic guard → access log (development) → metrics → deadline
//!   → rate limiter
//!   ├─ POST /webhook-checkout (raw bytes)
//!   └─ body parser → cookies → sanitize → dedupe → compression
//!        → request time → pages | /api/v1 resources | static | not found
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    handler::HandlerWithoutStateExt,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::body::{parse_body_middleware, BodyLimit};
use crate::http::params::{dedupe_params_middleware, ParamWhitelist};
use crate::http::request::{enforce_deadline, parse_cookies, tag_request_time, RequestDeadline};
use crate::http::response::{render_errors, ErrorRenderer};
use crate::lifecycle::shutdown::{wait as shutdown_signal, Shutdown};
use crate::observability::{access_log, track_metrics};
use crate::payments::{HmacVerifier, WebhookVerifier};
use crate::routing::{not_found, pages::page_routes, resources::api_routes, webhook::webhook_routes};
use crate::security::headers::InvalidHeader;
use crate::security::{
    cors_layer, rate_limit_middleware, sanitize_middleware, security_headers_middleware,
    RateLimiter, SecurityHeaders,
};
use crate::store::{DocumentStore, InMemoryStore};
use crate::views::{ShellRenderer, ViewRenderer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    /// `None` when no signing secret is configured.
    pub verifier: Option<Arc<dyn WebhookVerifier>>,
    pub views: Arc<dyn ViewRenderer>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// State with the built-in collaborators: in-memory store, shell views,
    /// and an HMAC verifier when a webhook secret is set.
    pub fn new(config: AppConfig) -> Self {
        let verifier: Option<Arc<dyn WebhookVerifier>> =
            if config.payments.webhook_secret.is_empty() {
                None
            } else {
                Some(Arc::new(HmacVerifier::new(
                    config.payments.webhook_secret.clone(),
                    Duration::from_secs(config.payments.tolerance_secs),
                )))
            };

        Self {
            store: Arc::new(InMemoryStore::new()),
            views: Arc::new(ShellRenderer::new(config.assets.site_name.clone())),
            limiter: Arc::new(RateLimiter::new(
                &config.rate_limit,
                config.listener.trust_proxy,
            )),
            verifier,
            config: Arc::new(config),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn WebhookVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_views(mut self, views: Arc<dyn ViewRenderer>) -> Self {
        self.views = views;
        self
    }
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Panic(detail).into_response()
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Result<Router, InvalidHeader> {
    let config = state.config.clone();
    let security_headers = SecurityHeaders::from_config(&config.security)?;
    let whitelist = ParamWhitelist::new(config.params.whitelist.iter().cloned());

    let static_files = ServeDir::new(&config.assets.static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(not_found.into_service());

    let parsed = Router::new()
        .merge(page_routes())
        .merge(api_routes())
        .fallback_service(static_files)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(
                    BodyLimit(config.body.limit_bytes),
                    parse_body_middleware,
                ))
                .layer(from_fn(parse_cookies))
                .layer(from_fn(sanitize_middleware))
                .layer(from_fn_with_state(whitelist, dedupe_params_middleware))
                .layer(CompressionLayer::new())
                .layer(from_fn(tag_request_time)),
        );

    let app = parsed
        .merge(webhook_routes(config.body.raw_limit_bytes))
        .with_state(state.clone());

    let pipeline = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(security_headers, security_headers_middleware))
        .layer(cors_layer(&config.cors))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(from_fn_with_state(
            ErrorRenderer::new(config.environment, state.views.clone()),
            render_errors,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .option_layer(config.environment.is_development().then(|| from_fn(access_log)))
        .layer(from_fn(track_metrics))
        .layer(from_fn_with_state(
            RequestDeadline(Duration::from_secs(config.timeouts.request_secs)),
            enforce_deadline,
        ))
        .layer(from_fn_with_state(state.limiter.clone(), rate_limit_middleware));

    Ok(app.layer(pipeline))
}

/// HTTP server for the tour application.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Server with the built-in collaborators.
    pub fn new(config: AppConfig) -> Result<Self, InvalidHeader> {
        Self::from_state(AppState::new(config))
    }

    pub fn from_state(state: AppState) -> Result<Self, InvalidHeader> {
        let router = build_router(state.clone())?;
        Ok(Self { router, state })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.config
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.state.config.environment,
            "HTTP server starting"
        );

        let sweeper = self.state.limiter.clone().spawn_sweeper(
            Duration::from_secs(self.state.config.rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(shutdown.subscribe()))
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
