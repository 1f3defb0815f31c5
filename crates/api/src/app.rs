use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use domain::services::WebhookStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{deliveries, endpoints, event_types, health};
use crate::services::{WebhookDeliveryService, WebhookExecutor};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub store: Arc<dyn WebhookStore>,
    pub deliveries: Arc<WebhookDeliveryService>,
}

impl AppState {
    /// Wire the delivery engine on top of `store`.
    ///
    /// `pool` backs the health probes; the store may or may not use it.
    pub fn new(
        config: Config,
        pool: PgPool,
        store: Arc<dyn WebhookStore>,
    ) -> Result<Self, reqwest::Error> {
        let executor = WebhookExecutor::new(store.clone(), config.webhooks.user_agent.clone())?;
        let deliveries = Arc::new(WebhookDeliveryService::new(store.clone(), executor));

        Ok(Self {
            pool,
            config: Arc::new(config),
            store,
            deliveries,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let webhook_routes = Router::new()
        .route(
            "/api/v1/webhooks/endpoints",
            get(endpoints::list_endpoints).post(endpoints::create_endpoint),
        )
        .route(
            "/api/v1/webhooks/endpoints/:endpoint_id",
            get(endpoints::get_endpoint)
                .put(endpoints::update_endpoint)
                .delete(endpoints::delete_endpoint),
        )
        .route(
            "/api/v1/webhooks/events",
            get(event_types::list_event_types).post(event_types::create_event_type),
        )
        .route(
            "/api/v1/webhooks/events/:event_type_id",
            put(event_types::update_event_type),
        )
        .route(
            "/api/v1/webhooks/deliveries",
            get(deliveries::list_deliveries).post(deliveries::create_delivery),
        )
        .route(
            "/api/v1/webhooks/deliveries/stats",
            get(deliveries::delivery_stats),
        )
        .route(
            "/api/v1/webhooks/deliveries/:delivery_id",
            get(deliveries::get_delivery),
        )
        .route(
            "/api/v1/webhooks/deliveries/:delivery_id/retry",
            post(deliveries::retry_delivery),
        )
        .route("/api/v1/webhooks/publish", post(deliveries::publish_event));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        // Bottom layers run first.
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
