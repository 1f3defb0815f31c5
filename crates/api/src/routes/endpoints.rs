//! Webhook endpoint management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    CreateEndpointRequest, EndpointResponse, ListEndpointsQuery, ListEndpointsResponse,
    NewEndpoint, UpdateEndpointRequest,
};
use shared::pagination::Pagination;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// POST /api/v1/webhooks/endpoints
pub async fn create_endpoint(
    State(state): State<AppState>,
    Json(request): Json<CreateEndpointRequest>,
) -> Result<(StatusCode, Json<EndpointResponse>), ApiError> {
    request.validate()?;

    let endpoint = state.store.create_endpoint(NewEndpoint::from(request)).await?;

    info!(
        endpoint_id = %endpoint.id,
        tenant_id = %endpoint.tenant_id,
        events = endpoint.events.len(),
        "Webhook endpoint created"
    );

    Ok((StatusCode::CREATED, Json(endpoint.into())))
}

/// GET /api/v1/webhooks/endpoints?tenantId=..&search=..&page=..&limit=..
pub async fn list_endpoints(
    State(state): State<AppState>,
    Query(query): Query<ListEndpointsQuery>,
) -> Result<Json<ListEndpointsResponse>, ApiError> {
    if query.tenant_id.trim().is_empty() {
        return Err(ApiError::validation("tenantId is required"));
    }

    let page = query.page_request();
    let (endpoints, total) = state
        .store
        .list_endpoints(&query.tenant_id, query.search_term(), page)
        .await?;

    Ok(Json(ListEndpointsResponse {
        webhooks: endpoints.into_iter().map(EndpointResponse::from).collect(),
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/v1/webhooks/endpoints/:endpoint_id
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<Uuid>,
) -> Result<Json<EndpointResponse>, ApiError> {
    let endpoint = state
        .store
        .find_endpoint(endpoint_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Webhook endpoint not found".into()))?;

    Ok(Json(endpoint.into()))
}

/// PUT /api/v1/webhooks/endpoints/:endpoint_id
///
/// Partial update. An empty `secret` turns signing off.
pub async fn update_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<Uuid>,
    Json(request): Json<UpdateEndpointRequest>,
) -> Result<Json<EndpointResponse>, ApiError> {
    request.validate()?;

    let endpoint = state
        .store
        .update_endpoint(endpoint_id, request.into())
        .await?
        .ok_or_else(|| ApiError::NotFound("Webhook endpoint not found".into()))?;

    info!(endpoint_id = %endpoint_id, "Webhook endpoint updated");

    Ok(Json(endpoint.into()))
}

/// DELETE /api/v1/webhooks/endpoints/:endpoint_id
///
/// Deliveries and attempts of the endpoint are removed with it.
pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(endpoint_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.store.delete_endpoint(endpoint_id).await? {
        return Err(ApiError::NotFound("Webhook endpoint not found".into()));
    }

    info!(endpoint_id = %endpoint_id, "Webhook endpoint deleted");
    Ok(StatusCode::NO_CONTENT)
}
