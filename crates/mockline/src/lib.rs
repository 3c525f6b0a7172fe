//! Mockline: HTTP stub server.
//!
//! Operators declare stub rules through the admin API; live traffic is
//! matched against the enabled rules and answered with the winning rule's
//! canned response.
//!
//! # Module Structure
//!
//! - `stub` - declarative rule model and validation
//! - `predicate` - rule compilation (URL, header, query, body) and regex cache
//! - `index` - concurrent match index with atomic snapshot swaps
//! - `coordinator` - keeps the store and the index in sync
//! - `dispatcher` - per-request lookup and response synthesis
//! - `store` - persistence trait and backends
//! - `admin_api` - hyper server, admin routes and traffic routing

pub mod admin_api;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod index;
pub mod logging;
pub mod metrics;
pub mod predicate;
pub mod request;
pub mod store;
pub mod stub;

pub use coordinator::{StubStatistics, SyncCoordinator};
pub use dispatcher::{DispatchOutcome, DispatchResponse, RequestDispatcher};
pub use error::EngineError;
pub use index::MatchIndex;
pub use request::MatchRequest;
pub use store::{StoreError, StubStore};
pub use stub::{StubRule, UrlMatchType};
