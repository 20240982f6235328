//! Services layer for identity-service.
//!
//! Business logic sits behind repository traits so the same code runs over
//! PostgreSQL in production and the in-process store in tests.

pub mod accounts;
pub mod audit;
pub mod authorization;
pub mod clients;
pub mod clock;
mod database;
pub mod error;
mod jwt;
pub mod ledger;
mod memory;
pub mod scopes;
pub mod stats;
pub mod store;

pub use accounts::AccountService;
pub use audit::{AuditEntry, AuditLog};
pub use authorization::{AuthorizationEngine, AuthorizationGrant, RevocationSummary};
pub use clients::{ClientRegistry, NewClient, RegisteredClient, UpdatedClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::Database;
pub use error::ServiceError;
pub use jwt::{AccessTokenClaims, TokenResponse, TokenService};
pub use ledger::SessionLedger;
pub use memory::MemoryStore;
pub use scopes::ScopeCatalog;
pub use stats::{IpCount, StatsService, StatsSnapshot};
pub use store::{
    ClientRepository, EventRepository, Repositories, ScopeRepository, SessionRepository,
    StoreHealth, UserRepository,
};
