//! Shared utilities and common types for the webhook engine.
//!
//! This crate provides common functionality used across all other crates:
//! - HMAC payload signing and verification
//! - Page/limit pagination
//! - Common validation logic

pub mod crypto;
pub mod pagination;
pub mod validation;
