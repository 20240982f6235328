//! HTTP handlers for identity-service.

pub mod auth;
pub mod developer;
pub mod metrics;
pub mod oauth;
pub mod scopes;
pub mod stats;
pub mod user;
