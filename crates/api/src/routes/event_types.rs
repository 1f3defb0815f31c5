//! Event type catalog handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::{
    CreateEventTypeRequest, ListEventTypesQuery, ListEventTypesResponse, UpdateEventTypeRequest,
    WebhookEventType,
};
use shared::pagination::Pagination;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;

/// GET /api/v1/webhooks/events?category=..
pub async fn list_event_types(
    State(state): State<AppState>,
    Query(query): Query<ListEventTypesQuery>,
) -> Result<Json<ListEventTypesResponse>, ApiError> {
    let page = query.page_request();
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let (events, total) = state.store.list_event_types(category, page).await?;

    Ok(Json(ListEventTypesResponse::new(
        events,
        Pagination::new(page, total),
    )))
}

/// POST /api/v1/webhooks/events
pub async fn create_event_type(
    State(state): State<AppState>,
    Json(request): Json<CreateEventTypeRequest>,
) -> Result<(StatusCode, Json<WebhookEventType>), ApiError> {
    request.validate()?;

    let key = request.event_type.clone();
    let event_type = state
        .store
        .create_event_type(request.into())
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("Event type '{}' already exists", key)))?;

    info!(
        event_type_id = %event_type.id,
        event_type = %event_type.event_type,
        category = %event_type.category,
        "Event type created"
    );

    Ok((StatusCode::CREATED, Json(event_type)))
}

/// PUT /api/v1/webhooks/events/:event_type_id
pub async fn update_event_type(
    State(state): State<AppState>,
    Path(event_type_id): Path<Uuid>,
    Json(request): Json<UpdateEventTypeRequest>,
) -> Result<Json<WebhookEventType>, ApiError> {
    request.validate()?;

    let event_type = state
        .store
        .update_event_type(event_type_id, request)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event type not found".into()))?;

    Ok(Json(event_type))
}
