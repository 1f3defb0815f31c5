//! Domain models for the webhook engine.

pub mod webhook_attempt;
pub mod webhook_delivery;
pub mod webhook_endpoint;
pub mod webhook_event;

pub use webhook_attempt::{
    AttemptOutcome, AttemptStatus, NewAttempt, WebhookAttempt, INTERRUPTED_ATTEMPT_MESSAGE,
};
pub use webhook_delivery::{
    truncate_response_body, CreateDeliveryRequest, DeliveryAttemptUpdate, DeliveryDetail,
    DeliveryFilter, DeliveryStats, DeliveryStatus, DeliverySummary, ListDeliveriesQuery,
    ListDeliveriesResponse, NewDelivery, PublishEventRequest, PublishEventResponse,
    WebhookDelivery, MAX_RESPONSE_BODY_CHARS,
};
pub use webhook_endpoint::{
    blend_response_time, CreateEndpointRequest, EndpointChanges, EndpointResponse,
    ListEndpointsQuery, ListEndpointsResponse, NewEndpoint, RetryPolicy, UpdateEndpointRequest,
    WebhookEndpoint, DEFAULT_ENDPOINT_PAGE_SIZE,
};
pub use webhook_event::{
    CreateEventTypeRequest, EventPriority, ListEventTypesQuery, ListEventTypesResponse,
    NewEventType, UpdateEventTypeRequest, WebhookEventType, DEFAULT_EVENT_TYPE_PAGE_SIZE,
};
