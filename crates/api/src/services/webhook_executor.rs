//! Single-attempt webhook executor.
//!
//! Performs one HTTP attempt for a delivery, records the attempt in the audit
//! log and advances the delivery to `success`, `retrying` or `failed`.

use chrono::{DateTime, Utc};
use domain::models::{
    truncate_response_body, AttemptOutcome, AttemptStatus, DeliveryAttemptUpdate, DeliveryStatus,
    NewAttempt, WebhookDelivery, WebhookEndpoint, INTERRUPTED_ATTEMPT_MESSAGE,
};
use domain::services::WebhookStore;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::webhook_delivery::WebhookDeliveryError;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Extra time a claim is held beyond the endpoint timeout.
const CLAIM_LEASE_GRACE_SECS: i64 = 60;

/// Outcome of the HTTP call before it is persisted.
struct CallResult {
    response_code: i32,
    response_body: Option<String>,
    response_time_ms: i64,
    error_message: Option<String>,
}

impl CallResult {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.response_code)
    }

    fn failed(error: String, elapsed: Duration) -> Self {
        Self {
            response_code: 0,
            response_body: None,
            response_time_ms: elapsed.as_millis() as i64,
            error_message: Some(error),
        }
    }
}

/// Executes delivery attempts against tenant endpoints.
pub struct WebhookExecutor {
    store: Arc<dyn WebhookStore>,
    client: Client,
    user_agent: String,
}

impl WebhookExecutor {
    /// Create an executor sharing one HTTP client across all attempts.
    ///
    /// Deadlines are applied per request from the endpoint configuration.
    pub fn new(
        store: Arc<dyn WebhookStore>,
        user_agent: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;

        Ok(Self {
            store,
            client,
            user_agent: user_agent.into(),
        })
    }

    /// Perform one attempt for `delivery_id`.
    ///
    /// Returns `Ok(None)` without side effects when the delivery is already
    /// terminal, not yet due, or another worker claimed it first. Transport failures and
    /// non-2xx responses are recorded, never returned as errors.
    pub async fn execute_attempt(
        &self,
        delivery_id: Uuid,
    ) -> Result<Option<WebhookDelivery>, WebhookDeliveryError> {
        let delivery = self
            .store
            .find_delivery(delivery_id)
            .await?
            .ok_or_else(|| WebhookDeliveryError::NotFound("Delivery not found".into()))?;

        if delivery.is_terminal() {
            debug!(
                delivery_id = %delivery_id,
                status = %delivery.status,
                "Delivery already terminal, skipping attempt"
            );
            return Ok(None);
        }

        if delivery.next_attempt_at.is_some_and(|at| at > Utc::now()) {
            debug!(delivery_id = %delivery_id, "Delivery not due or in flight, skipping attempt");
            return Ok(None);
        }

        let endpoint = self
            .store
            .find_endpoint(delivery.endpoint_id)
            .await?
            .ok_or_else(|| WebhookDeliveryError::NotFound("Webhook endpoint not found".into()))?;

        let lease_until = Utc::now()
            + chrono::Duration::seconds(endpoint.timeout().as_secs() as i64 + CLAIM_LEASE_GRACE_SECS);
        let Some(claimed) = self
            .store
            .claim_delivery(delivery_id, delivery.version, lease_until)
            .await?
        else {
            debug!(delivery_id = %delivery_id, "Delivery claimed by another worker");
            return Ok(None);
        };

        let interrupted = self
            .store
            .fail_interrupted_attempts(delivery_id, INTERRUPTED_ATTEMPT_MESSAGE)
            .await?;
        if interrupted > 0 {
            warn!(
                delivery_id = %delivery_id,
                interrupted = interrupted,
                "Marked interrupted attempts as failed"
            );
        }

        let attempt_number = claimed.attempts + 1;
        let request_headers =
            build_request_headers(&self.user_agent, claimed.signature.as_deref(), &endpoint.headers);
        let request_body = serde_json::to_string(&claimed.payload)
            .map_err(domain::services::StoreError::from)?;

        let attempt = self
            .store
            .insert_attempt(NewAttempt {
                delivery_id,
                endpoint_id: endpoint.id,
                attempt_number,
                request_headers: request_headers.clone(),
                request_body: request_body.clone(),
                timestamp: Utc::now(),
            })
            .await?;

        let result = self
            .send(&endpoint, &request_headers, request_body)
            .await;
        let success = result.is_success();
        record_attempt_metrics(success, result.response_time_ms);

        self.store
            .complete_attempt(
                attempt.id,
                AttemptOutcome {
                    status: if success {
                        AttemptStatus::Success
                    } else {
                        AttemptStatus::Failed
                    },
                    response_code: result.response_code,
                    response_body: result.response_body.clone(),
                    response_time_ms: result.response_time_ms,
                    error_message: result.error_message.clone(),
                },
            )
            .await?;

        let now = Utc::now();
        let update = next_state(&claimed, &endpoint, attempt_number, result, now);
        let status = update.status;
        let response_time_ms = update.response_time_ms;

        let Some(updated) = self
            .store
            .record_delivery_attempt(delivery_id, claimed.version, update)
            .await?
        else {
            warn!(
                delivery_id = %delivery_id,
                attempt_number = attempt_number,
                "Delivery changed during attempt, outcome not applied"
            );
            return Ok(None);
        };

        if status.is_terminal() {
            self.store
                .record_endpoint_outcome(
                    endpoint.id,
                    status == DeliveryStatus::Success,
                    response_time_ms,
                    now,
                )
                .await?;
        }

        match status {
            DeliveryStatus::Success => info!(
                delivery_id = %delivery_id,
                endpoint_id = %endpoint.id,
                attempt_number = attempt_number,
                status_code = updated.response_code,
                response_time_ms = response_time_ms,
                "Webhook delivered"
            ),
            DeliveryStatus::Retrying => warn!(
                delivery_id = %delivery_id,
                endpoint_id = %endpoint.id,
                attempt_number = attempt_number,
                status_code = updated.response_code,
                error = updated.error_message.as_deref().unwrap_or_default(),
                next_attempt_at = ?updated.next_attempt_at,
                "Webhook attempt failed, retry scheduled"
            ),
            _ => warn!(
                delivery_id = %delivery_id,
                endpoint_id = %endpoint.id,
                attempt_number = attempt_number,
                status_code = updated.response_code,
                error = updated.error_message.as_deref().unwrap_or_default(),
                "Webhook delivery failed permanently"
            ),
        }

        Ok(Some(updated))
    }

    /// Send the request, folding every failure into the result.
    async fn send(
        &self,
        endpoint: &WebhookEndpoint,
        headers: &BTreeMap<String, String>,
        body: String,
    ) -> CallResult {
        let started = Instant::now();

        let method = match Method::from_bytes(endpoint.http_method.as_bytes()) {
            Ok(method) => method,
            Err(e) => return CallResult::failed(format!("Invalid HTTP method: {}", e), started.elapsed()),
        };
        let header_map = match to_header_map(headers) {
            Ok(map) => map,
            Err(e) => return CallResult::failed(e, started.elapsed()),
        };

        let timeout = endpoint.timeout();
        let response = self
            .client
            .request(method, &endpoint.url)
            .headers(header_map)
            .timeout(timeout)
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16() as i32;
                let text = response.text().await;
                let elapsed = started.elapsed();
                match text {
                    Ok(text) => CallResult {
                        response_code: status,
                        response_body: Some(truncate_response_body(&text)),
                        response_time_ms: elapsed.as_millis() as i64,
                        error_message: if (200..300).contains(&status) {
                            None
                        } else {
                            Some(format!("HTTP {}", status))
                        },
                    },
                    Err(e) => CallResult {
                        response_code: status,
                        response_body: None,
                        response_time_ms: elapsed.as_millis() as i64,
                        error_message: Some(describe_transport_error(&e, timeout)),
                    },
                }
            }
            Err(e) => CallResult::failed(describe_transport_error(&e, timeout), started.elapsed()),
        }
    }
}

/// Outgoing headers: defaults, then the signature, then endpoint headers.
///
/// Later layers replace earlier keys regardless of case.
pub fn build_request_headers(
    user_agent: &str,
    signature: Option<&str>,
    custom: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("User-Agent".to_string(), user_agent.to_string());

    if let Some(signature) = signature {
        overlay_header(&mut headers, SIGNATURE_HEADER, signature);
    }
    for (name, value) in custom {
        overlay_header(&mut headers, name, value);
    }
    headers
}

fn overlay_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("Invalid header name: {}", name))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| format!("Invalid value for header {}", name))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn describe_transport_error(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("Request timed out after {}s", timeout.as_secs())
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        format!("Request failed: {}", error)
    }
}

/// Delivery state after attempt `attempt_number` finished with `result`.
fn next_state(
    delivery: &WebhookDelivery,
    endpoint: &WebhookEndpoint,
    attempt_number: i32,
    result: CallResult,
    now: DateTime<Utc>,
) -> DeliveryAttemptUpdate {
    let success = result.is_success();
    let (status, next_attempt_at) = if success {
        (DeliveryStatus::Success, None)
    } else if attempt_number >= delivery.max_attempts {
        (DeliveryStatus::Failed, None)
    } else {
        (
            DeliveryStatus::Retrying,
            Some(endpoint.retry_policy.next_attempt_at(now, attempt_number)),
        )
    };

    DeliveryAttemptUpdate {
        attempts: attempt_number,
        status,
        last_attempt_at: now,
        next_attempt_at,
        response_code: result.response_code,
        response_body: result.response_body,
        response_time_ms: result.response_time_ms,
        error_message: if success { None } else { result.error_message },
    }
}

fn record_attempt_metrics(success: bool, response_time_ms: i64) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("webhook_attempts_total", "outcome" => outcome).increment(1);
    metrics::histogram!("webhook_attempt_duration_seconds")
        .record(response_time_ms as f64 / 1000.0);
}
