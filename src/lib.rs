//! `rbac-core` is the authorization decision and mutation engine for a stateful RBAC
//! service: the data model for role names, roles, users and user-role assignments; the
//! transactional mutation protocol (create/update/delete of roles and user assignments
//! with orphan-cleanup); the decision procedure (raw flag match, or delegation to an
//! external policy evaluator); and the concurrent name-lookup cache that accelerates
//! response assembly.
//!
//! The layered structure is
//!
//! `Query API -> Decision Engine | Mutation Engine -> Role Assembly -> Name Cache + Store`
//!
//! Deliberately out of scope: the RPC transport and codec framing, process bootstrap,
//! database dialect selection, TLS and telemetry plumbing, and the policy evaluator's own
//! decision logic — all represented here as traits and plain data a surrounding service
//! supplies. See `Store`, `authorization::PolicyOracle`.

pub mod authorization;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod models;
pub mod mutation;
pub mod query_api;
pub mod schema;
pub mod store;

pub use authorization::{DecisionEngine, FlagMatchEngine, OracleEngine};
pub use authorization::oracle::{NullOracle, OracleInput, OracleUserRole, PolicyOracle};
pub use cache::NameCache;
pub use config::Config;
pub use error::Error;
pub use query_api::QueryApi;
pub use store::{CancellationToken, Store, StoreOps, StoreTransaction};
