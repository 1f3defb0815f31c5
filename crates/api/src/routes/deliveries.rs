//! Delivery handlers: dispatch, history, statistics, manual retry and
//! event publishing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    CreateDeliveryRequest, DeliveryDetail, DeliveryStats, ListDeliveriesQuery,
    ListDeliveriesResponse, PublishEventRequest, PublishEventResponse, WebhookDelivery,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// POST /api/v1/webhooks/deliveries
///
/// Returns the pending delivery; the first attempt runs in the background.
pub async fn create_delivery(
    State(state): State<AppState>,
    Json(request): Json<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<WebhookDelivery>), ApiError> {
    let delivery = state.deliveries.create_delivery(request).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

/// GET /api/v1/webhooks/deliveries
pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<ListDeliveriesResponse>, ApiError> {
    Ok(Json(state.deliveries.list_deliveries(&query).await?))
}

/// GET /api/v1/webhooks/deliveries/stats
///
/// Accepts the same filters as the listing; paging parameters are ignored.
pub async fn delivery_stats(
    State(state): State<AppState>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<DeliveryStats>, ApiError> {
    Ok(Json(state.deliveries.delivery_stats(&query.filter()).await?))
}

/// GET /api/v1/webhooks/deliveries/:delivery_id
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> Result<Json<DeliveryDetail>, ApiError> {
    Ok(Json(state.deliveries.get_delivery(delivery_id).await?))
}

/// POST /api/v1/webhooks/deliveries/:delivery_id/retry
pub async fn retry_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<Uuid>,
) -> Result<Json<WebhookDelivery>, ApiError> {
    Ok(Json(state.deliveries.retry_delivery(delivery_id).await?))
}

/// POST /api/v1/webhooks/publish
pub async fn publish_event(
    State(state): State<AppState>,
    Json(request): Json<PublishEventRequest>,
) -> Result<(StatusCode, Json<PublishEventResponse>), ApiError> {
    let deliveries = state.deliveries.publish_event(request).await?;
    Ok((StatusCode::ACCEPTED, Json(PublishEventResponse { deliveries })))
}
