pub mod auth_session;
pub mod client_app;
pub mod event_log;
pub mod scope;
pub mod user;

pub use auth_session::{AuthSession, RejectReason};
pub use client_app::{AppScope, ClientApp, ClientAppPatch, ClientAppView, ScopeDiff};
pub use event_log::{EventLog, EventType, NewEvent};
pub use scope::{Scope, ScopeCategory, ScopeSet, DEFAULT_SCOPES};
pub use user::{NewUser, ProfilePatch, SanitizedUser, User};
