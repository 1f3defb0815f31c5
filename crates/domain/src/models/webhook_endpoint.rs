//! Webhook endpoint domain model.
//!
//! An endpoint is a tenant-registered HTTP destination. It owns the signing
//! secret, the request shape (method, custom headers, timeout), the retry
//! policy that new deliveries snapshot, and rolling outcome counters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::pagination::{PageRequest, Pagination};
use shared::validation::{validate_custom_headers, validate_http_method, validate_http_scheme};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// Default per-request deadline in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: i32 = 30;

/// Default HTTP method for new endpoints.
pub const DEFAULT_HTTP_METHOD: &str = "POST";

/// Subscription wildcard matching every event type.
pub const WILDCARD_EVENT: &str = "*";

/// Page size for endpoint listings when none is given.
pub const DEFAULT_ENDPOINT_PAGE_SIZE: i64 = 10;

fn default_max_retries() -> i32 {
    3
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_base_delay_seconds() -> i64 {
    60
}

/// Retry policy applied to deliveries created for an endpoint.
///
/// Missing keys fall back to their defaults, so a stored `{}` is a valid
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, max = 10, message = "maxRetries must be between 1 and 10"))]
    pub max_retries: i32,

    #[serde(default = "default_backoff_multiplier")]
    #[validate(range(
        min = 1.0,
        max = 10.0,
        message = "backoffMultiplier must be between 1 and 10"
    ))]
    pub backoff_multiplier: f64,

    #[serde(default = "default_base_delay_seconds")]
    #[validate(range(
        min = 1,
        max = 86400,
        message = "baseDelaySeconds must be between 1 and 86400"
    ))]
    pub base_delay_seconds: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_multiplier: default_backoff_multiplier(),
            base_delay_seconds: default_base_delay_seconds(),
        }
    }
}

impl RetryPolicy {
    /// Attempt cap snapshotted onto a new delivery. Non-positive values fall
    /// back to the default.
    pub fn max_attempts(&self) -> i32 {
        if self.max_retries > 0 {
            self.max_retries
        } else {
            default_max_retries()
        }
    }

    /// Delay before the next try after `attempts` failed tries:
    /// `baseDelay * multiplier^(attempts - 1)`.
    pub fn backoff_delay(&self, attempts: i32) -> Duration {
        let exponent = attempts.max(1) - 1;
        let seconds = self.base_delay_seconds as f64 * self.backoff_multiplier.powi(exponent);
        let millis = (seconds * 1000.0).round();

        if !millis.is_finite() || millis >= i64::MAX as f64 {
            return Duration::MAX;
        }
        Duration::try_milliseconds(millis as i64).unwrap_or(Duration::MAX)
    }

    /// Absolute time of the next try, saturating at the maximum timestamp.
    pub fn next_attempt_at(&self, now: DateTime<Utc>, attempts: i32) -> DateTime<Utc> {
        now.checked_add_signed(self.backoff_delay(attempts))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Blends a new latency sample into the stored average.
///
/// This is a two-point blend, not a running mean: the latest sample always
/// carries half the weight.
pub fn blend_response_time(prior_avg: Option<f64>, sample_ms: i64) -> f64 {
    match prior_avg {
        Some(avg) => (avg + sample_ms as f64) / 2.0,
        None => sample_ms as f64,
    }
}

/// Represents a webhook endpoint in the system.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEndpoint {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub http_method: String,
    /// Subscribed event types; `*` subscribes to everything.
    pub events: Vec<String>,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub timeout_seconds: i32,
    pub retry_policy: RetryPolicy,
    pub success_count: i64,
    pub failure_count: i64,
    pub avg_response_time_ms: Option<f64>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for WebhookEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookEndpoint")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("http_method", &self.http_method)
            .field("events", &self.events)
            .field("has_secret", &self.has_secret())
            .field("timeout_seconds", &self.timeout_seconds)
            .field("retry_policy", &self.retry_policy)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl WebhookEndpoint {
    /// Whether a non-empty signing secret is configured.
    pub fn has_secret(&self) -> bool {
        self.secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// The signing secret, ignoring an empty string.
    pub fn signing_secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Whether the endpoint receives `event_type`.
    pub fn is_subscribed_to(&self, event_type: &str) -> bool {
        self.events
            .iter()
            .any(|e| e == WILDCARD_EVENT || e == event_type)
    }

    /// Per-request deadline, falling back to the default for non-positive values.
    pub fn timeout(&self) -> std::time::Duration {
        let secs = if self.timeout_seconds > 0 {
            self.timeout_seconds
        } else {
            DEFAULT_TIMEOUT_SECONDS
        };
        std::time::Duration::from_secs(secs as u64)
    }

    pub fn total_deliveries(&self) -> i64 {
        self.success_count + self.failure_count
    }

    /// Success rate in percent, rounded to two decimals.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_deliveries();
        if total == 0 {
            return 0.0;
        }
        let rate = self.success_count as f64 / total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Request payload for creating an endpoint.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEndpointRequest {
    #[validate(length(min = 1, max = 100, message = "tenantId is required"))]
    pub tenant_id: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[validate(
        url(message = "Invalid URL format"),
        length(max = 2048, message = "URL must be at most 2048 characters"),
        custom(function = "validate_http_scheme")
    )]
    pub url: String,

    #[validate(custom(function = "validate_http_method"))]
    pub method: Option<String>,

    #[validate(length(min = 1, message = "At least one event type is required"))]
    pub events: Vec<String>,

    #[validate(custom(function = "validate_custom_headers"))]
    pub headers: Option<BTreeMap<String, String>>,

    #[validate(length(min = 1, max = 256, message = "Secret must be 1-256 characters"))]
    pub secret: Option<String>,

    #[validate(nested)]
    pub retry_policy: Option<RetryPolicy>,

    #[serde(alias = "timeout")]
    #[validate(range(min = 1, max = 300, message = "Timeout must be 1-300 seconds"))]
    pub timeout_seconds: Option<i32>,
}

/// Request payload for updating an endpoint (partial update).
///
/// An empty `secret` clears the secret and disables signing.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEndpointRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[validate(
        url(message = "Invalid URL format"),
        length(max = 2048, message = "URL must be at most 2048 characters"),
        custom(function = "validate_http_scheme")
    )]
    pub url: Option<String>,

    #[validate(custom(function = "validate_http_method"))]
    pub method: Option<String>,

    #[validate(length(min = 1, message = "At least one event type is required"))]
    pub events: Option<Vec<String>>,

    #[validate(custom(function = "validate_custom_headers"))]
    pub headers: Option<BTreeMap<String, String>>,

    #[validate(length(max = 256, message = "Secret must be at most 256 characters"))]
    pub secret: Option<String>,

    #[validate(nested)]
    pub retry_policy: Option<RetryPolicy>,

    #[serde(alias = "timeout")]
    #[validate(range(min = 1, max = 300, message = "Timeout must be 1-300 seconds"))]
    pub timeout_seconds: Option<i32>,

    pub is_active: Option<bool>,
}

/// Data for inserting an endpoint, with defaults already applied.
#[derive(Debug, Clone)]
pub struct NewEndpoint {
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub http_method: String,
    pub events: Vec<String>,
    pub headers: BTreeMap<String, String>,
    pub secret: Option<String>,
    pub timeout_seconds: i32,
    pub retry_policy: RetryPolicy,
}

impl From<CreateEndpointRequest> for NewEndpoint {
    fn from(r: CreateEndpointRequest) -> Self {
        Self {
            tenant_id: r.tenant_id,
            name: r.name,
            description: r.description,
            url: r.url,
            http_method: r
                .method
                .map(|m| m.to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_HTTP_METHOD.to_string()),
            events: r.events,
            headers: r.headers.unwrap_or_default(),
            secret: r.secret.filter(|s| !s.is_empty()),
            timeout_seconds: r.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            retry_policy: r.retry_policy.unwrap_or_default(),
        }
    }
}

/// Field changes for a partial endpoint update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct EndpointChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub http_method: Option<String>,
    pub events: Option<Vec<String>>,
    pub headers: Option<BTreeMap<String, String>>,
    /// `Some(None)` clears the secret.
    pub secret: Option<Option<String>>,
    pub timeout_seconds: Option<i32>,
    pub retry_policy: Option<RetryPolicy>,
    pub is_active: Option<bool>,
}

impl From<UpdateEndpointRequest> for EndpointChanges {
    fn from(r: UpdateEndpointRequest) -> Self {
        Self {
            name: r.name,
            description: r.description,
            url: r.url,
            http_method: r.method.map(|m| m.to_ascii_uppercase()),
            events: r.events,
            headers: r.headers,
            secret: r.secret.map(|s| if s.is_empty() { None } else { Some(s) }),
            timeout_seconds: r.timeout_seconds,
            retry_policy: r.retry_policy,
            is_active: r.is_active,
        }
    }
}

impl EndpointChanges {
    /// Applies the changes to an endpoint in place.
    pub fn apply(self, endpoint: &mut WebhookEndpoint, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            endpoint.name = name;
        }
        if let Some(description) = self.description {
            endpoint.description = Some(description);
        }
        if let Some(url) = self.url {
            endpoint.url = url;
        }
        if let Some(method) = self.http_method {
            endpoint.http_method = method;
        }
        if let Some(events) = self.events {
            endpoint.events = events;
        }
        if let Some(headers) = self.headers {
            endpoint.headers = headers;
        }
        if let Some(secret) = self.secret {
            endpoint.secret = secret;
        }
        if let Some(timeout) = self.timeout_seconds {
            endpoint.timeout_seconds = timeout;
        }
        if let Some(policy) = self.retry_policy {
            endpoint.retry_policy = policy;
        }
        if let Some(active) = self.is_active {
            endpoint.is_active = active;
        }
        endpoint.updated_at = now;
    }
}

/// Derived security flags shown with an endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSecurity {
    pub signature_verification: bool,
    pub https_required: bool,
}

/// Response payload for endpoint operations. Never carries the secret.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResponse {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub method: String,
    pub events: Vec<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout_seconds: i32,
    pub retry_policy: RetryPolicy,
    pub success_count: i64,
    pub failure_count: i64,
    pub total_deliveries: i64,
    pub success_rate: f64,
    pub avg_response_time_ms: Option<f64>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub security: EndpointSecurity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookEndpoint> for EndpointResponse {
    fn from(e: WebhookEndpoint) -> Self {
        let security = EndpointSecurity {
            signature_verification: e.has_secret(),
            https_required: e.url.to_ascii_lowercase().starts_with("https://"),
        };
        let total_deliveries = e.total_deliveries();
        let success_rate = e.success_rate();

        Self {
            id: e.id,
            tenant_id: e.tenant_id,
            name: e.name,
            description: e.description,
            url: e.url,
            method: e.http_method,
            events: e.events,
            headers: e.headers,
            timeout_seconds: e.timeout_seconds,
            retry_policy: e.retry_policy,
            success_count: e.success_count,
            failure_count: e.failure_count,
            total_deliveries,
            success_rate,
            avg_response_time_ms: e.avg_response_time_ms,
            last_triggered_at: e.last_triggered_at,
            is_active: e.is_active,
            security,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

/// Query parameters for listing endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEndpointsQuery {
    pub tenant_id: String,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListEndpointsQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_ENDPOINT_PAGE_SIZE)
    }

    /// Search term, ignoring blank input.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Response for listing endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEndpointsResponse {
    pub webhooks: Vec<EndpointResponse>,
    pub pagination: Pagination,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_endpoint() -> WebhookEndpoint {
        WebhookEndpoint {
            id: Uuid::new_v4(),
            tenant_id: "tenant_acme".to_string(),
            name: "Order sync".to_string(),
            description: None,
            url: "https://hooks.example.com/orders".to_string(),
            http_method: "POST".to_string(),
            events: vec!["order.created".to_string()],
            headers: BTreeMap::new(),
            secret: Some("whsec_test".to_string()),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            retry_policy: RetryPolicy::default(),
            success_count: 0,
            failure_count: 0,
            avg_response_time_ms: None,
            last_triggered_at: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.base_delay_seconds, 60);
    }

    #[test]
    fn test_retry_policy_partial_json_uses_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"maxRetries": 5}"#).unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.base_delay_seconds, 60);

        let empty: RetryPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, RetryPolicy::default());
    }

    #[test]
    fn test_backoff_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::seconds(60));
        assert_eq!(policy.backoff_delay(2), Duration::seconds(120));
        assert_eq!(policy.backoff_delay(3), Duration::seconds(240));
    }

    #[test]
    fn test_backoff_strictly_increasing() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_multiplier: 1.5,
            base_delay_seconds: 10,
        };
        let delays: Vec<Duration> = (1..=10).map(|n| policy.backoff_delay(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_backoff_constant_with_unit_multiplier() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_multiplier: 1.0,
            base_delay_seconds: 30,
        };
        assert_eq!(policy.backoff_delay(1), policy.backoff_delay(4));
    }

    #[test]
    fn test_backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_retries: 10,
            backoff_multiplier: 1e300,
            base_delay_seconds: 86400,
        };
        assert_eq!(policy.backoff_delay(5), Duration::MAX);
        assert_eq!(
            policy.next_attempt_at(Utc::now(), 5),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_max_attempts_falls_back_on_zero() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_blend_response_time() {
        assert_eq!(blend_response_time(None, 120), 120.0);
        assert_eq!(blend_response_time(Some(100.0), 300), 200.0);
        // Recent sample dominates: not a true mean of 100, 300, 300
        let avg = blend_response_time(Some(200.0), 300);
        assert_eq!(avg, 250.0);
    }

    #[test]
    fn test_is_subscribed_to() {
        let mut endpoint = sample_endpoint();
        assert!(endpoint.is_subscribed_to("order.created"));
        assert!(!endpoint.is_subscribed_to("order.refunded"));

        endpoint.events = vec![WILDCARD_EVENT.to_string()];
        assert!(endpoint.is_subscribed_to("order.refunded"));
    }

    #[test]
    fn test_signing_secret_ignores_empty() {
        let mut endpoint = sample_endpoint();
        assert_eq!(endpoint.signing_secret(), Some("whsec_test"));
        endpoint.secret = Some(String::new());
        assert!(endpoint.signing_secret().is_none());
        assert!(!endpoint.has_secret());
    }

    #[test]
    fn test_timeout_fallback() {
        let mut endpoint = sample_endpoint();
        endpoint.timeout_seconds = 5;
        assert_eq!(endpoint.timeout(), std::time::Duration::from_secs(5));
        endpoint.timeout_seconds = 0;
        assert_eq!(endpoint.timeout(), std::time::Duration::from_secs(30));
    }

    #[test]
    fn test_success_rate() {
        let mut endpoint = sample_endpoint();
        assert_eq!(endpoint.success_rate(), 0.0);
        endpoint.success_count = 2;
        endpoint.failure_count = 1;
        assert_eq!(endpoint.success_rate(), 66.67);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let endpoint = sample_endpoint();
        let debug = format!("{:?}", endpoint);
        assert!(!debug.contains("whsec_test"));
        assert!(debug.contains("has_secret: true"));
    }

    #[test]
    fn test_endpoint_response_hides_secret() {
        let response: EndpointResponse = sample_endpoint().into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("whsec_test"));
        assert!(json.contains("\"signatureVerification\":true"));
        assert!(json.contains("\"httpsRequired\":true"));
    }

    #[test]
    fn test_create_endpoint_request_validation() {
        let json = r#"{
            "tenantId": "tenant_acme",
            "name": "Orders",
            "url": "https://hooks.example.com/orders",
            "events": ["order.created"],
            "timeout": 10
        }"#;
        let request: CreateEndpointRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.timeout_seconds, Some(10));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_endpoint_request_rejects_missing_events() {
        let json = r#"{
            "tenantId": "tenant_acme",
            "name": "Orders",
            "url": "https://hooks.example.com/orders",
            "events": []
        }"#;
        let request: CreateEndpointRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_create_endpoint_request_rejects_bad_url_and_policy() {
        let json = r#"{
            "tenantId": "tenant_acme",
            "name": "Orders",
            "url": "not a url",
            "events": ["order.created"]
        }"#;
        let request: CreateEndpointRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_err());

        let json = r#"{
            "tenantId": "tenant_acme",
            "name": "Orders",
            "url": "https://hooks.example.com/orders",
            "events": ["order.created"],
            "retryPolicy": {"maxRetries": 50}
        }"#;
        let request: CreateEndpointRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_update_endpoint_request_partial() {
        let request: UpdateEndpointRequest =
            serde_json::from_str(r#"{"isActive": false}"#).unwrap();
        assert_eq!(request.is_active, Some(false));
        assert!(request.name.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_new_endpoint_applies_defaults() {
        let json = r#"{
            "tenantId": "tenant_acme",
            "name": "Orders",
            "url": "https://hooks.example.com/orders",
            "method": "put",
            "events": ["order.created"],
            "secret": ""
        }"#;
        let request: CreateEndpointRequest = serde_json::from_str(json).unwrap();
        let new: NewEndpoint = request.into();
        assert_eq!(new.http_method, "PUT");
        assert!(new.secret.is_none());
        assert_eq!(new.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
        assert_eq!(new.retry_policy, RetryPolicy::default());
        assert!(new.headers.is_empty());
    }

    #[test]
    fn test_endpoint_changes_clear_secret_and_keep_rest() {
        let mut endpoint = sample_endpoint();
        let original_url = endpoint.url.clone();
        let request: UpdateEndpointRequest =
            serde_json::from_str(r#"{"secret": "", "isActive": false, "method": "patch"}"#)
                .unwrap();

        EndpointChanges::from(request).apply(&mut endpoint, Utc::now());

        assert!(endpoint.secret.is_none());
        assert!(!endpoint.is_active);
        assert_eq!(endpoint.http_method, "PATCH");
        assert_eq!(endpoint.url, original_url);
    }

    #[test]
    fn test_list_query_defaults_and_blank_search() {
        let query: ListEndpointsQuery =
            serde_json::from_str(r#"{"tenantId": "tenant_acme", "search": "  "}"#).unwrap();
        assert_eq!(query.page_request().limit(), DEFAULT_ENDPOINT_PAGE_SIZE);
        assert_eq!(query.page_request().page(), 1);
        assert!(query.search_term().is_none());
    }
}
