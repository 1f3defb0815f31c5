//! Webhook attempt audit log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Error recorded on an attempt whose worker stopped before completing it.
pub const INTERRUPTED_ATTEMPT_MESSAGE: &str = "Attempt interrupted before completion";

/// Attempt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Success,
    Failed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Success => "success",
            AttemptStatus::Failed => "failed",
        }
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AttemptStatus::Pending),
            "success" => Ok(AttemptStatus::Success),
            "failed" => Ok(AttemptStatus::Failed),
            _ => Err(format!("Unknown attempt status: {}", s)),
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One concrete HTTP try belonging to a delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAttempt {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub endpoint_id: Uuid,
    /// 1-based.
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: String,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Request snapshot persisted before the HTTP call is made.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub delivery_id: Uuid,
    pub endpoint_id: Uuid,
    pub attempt_number: i32,
    pub request_headers: BTreeMap<String, String>,
    pub request_body: String,
    pub timestamp: DateTime<Utc>,
}

/// Final result written to an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub status: AttemptStatus,
    pub response_code: i32,
    /// Already truncated.
    pub response_body: Option<String>,
    pub response_time_ms: i64,
    pub error_message: Option<String>,
}
