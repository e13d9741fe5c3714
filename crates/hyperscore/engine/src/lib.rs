//! Hyperscore Engine
//!
//! Evaluates rules against elements and aggregates the results into
//! schemes. The engine is synchronous and side-effect free apart from
//! logging: callers hand it a materialized snapshot of the catalogs and
//! get back derived views.
//!
//! # Pipeline
//!
//! 1. [`RuleCatalog::compile`] compiles every rule's scoring body. A body
//!    that does not compile degrades to a scorer that always returns 0.
//! 2. [`CompiledRule::apply`] applies one rule to one element: type filter,
//!    [`effective_attributes`], required-key filter, scorer, weight.
//! 3. [`evaluate`] sums weighted rule scores per element for a scheme and
//!    selects elements with a positive total.
//! 4. [`rule_element_hyperedges`] and [`scheme_rule_hyperedges`] derive the
//!    relationship views from the same snapshot.

#![deny(unsafe_code)]

mod catalog;
mod errors;
mod evaluate;
mod flatten;
mod hyperedge;
mod rule;
mod scorer;

pub use catalog::*;
pub use errors::*;
pub use evaluate::*;
pub use flatten::*;
pub use hyperedge::*;
pub use rule::*;
pub use scorer::{
    compile as compile_scorer, CompiledScorer, ConstantScorer, Scorer, ScriptScorer,
    DEGRADED_SCORE, EMPTY_BODY_SCORE,
};
