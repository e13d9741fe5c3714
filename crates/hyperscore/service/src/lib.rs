//! Hyperscore Service
//!
//! The facade an HTTP layer calls into: element, rule, scheme and
//! hypergraph CRUD, scheme evaluation, and the derived hyperedge views.
//! It owns the rule read cache, the degraded-mode fallback and bootstrap
//! seeding. The `hyperscored` binary wraps it in a command-line interface.

#![deny(unsafe_code)]

mod cache;
pub mod config;
mod error;
mod seed;
mod service;

pub use cache::{RuleCache, RuleSnapshot};
pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use seed::{DemoHypergraph, SeedData, SeedReport};
pub use service::{check_scoring_body, BodyDiagnostics, HypergraphService, RulePreview};
