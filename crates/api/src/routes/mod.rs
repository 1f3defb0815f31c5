//! HTTP route handlers.

pub mod deliveries;
pub mod endpoints;
pub mod event_types;
pub mod health;
