//! Domain layer for the webhook engine.
//!
//! This crate contains:
//! - Domain models (endpoints, event types, deliveries, attempts)
//! - The `WebhookStore` persistence seam and an in-memory implementation

pub mod models;
pub mod services;
