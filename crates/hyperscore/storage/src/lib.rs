//! Hyperscore storage abstractions.
//!
//! This crate defines the storage contract for the four catalogs:
//! - elements, keyed by element id
//! - rules, keyed by rule id
//! - schemes, keyed by parent hypergraph and scheme id
//! - hypergraph aggregates
//!
//! Records are wrapped in [`Stored`], which carries a store-private
//! surrogate id and timestamps. The service strips the surrogate id before
//! anything is returned to a client.
//!
//! [`TimeoutStore`] bounds every call of any backend with a per-call
//! deadline.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod timeout;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryCatalogStore;
pub use model::{ElementFilter, RuleFilter, SchemeFilter, SchemeKey, SchemeScope, Stored};
pub use timeout::TimeoutStore;
pub use traits::{CatalogStore, ElementStore, HypergraphStore, RuleStore, SchemeStore};
