//! Domain services for the webhook engine.

pub mod webhook_store;

pub use webhook_store::{InMemoryWebhookStore, StoreError, WebhookStore};
