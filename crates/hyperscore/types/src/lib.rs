//! Hyperscore Domain Types
//!
//! Hyperscore scores typed records against operator-supplied rules and
//! aggregates the results into weighted schemes. This crate holds the
//! shared vocabulary; it contains no evaluation logic.
//!
//! # Key Concepts
//!
//! - **Element**: a typed record with free-form JSON attributes.
//! - **Rule**: a named, weighted scoring body filtered by element type and
//!   required attribute keys.
//! - **Scheme**: a named mapping of rule ids to weights.
//! - **Hypergraph**: a parent aggregate that groups schemes.
//! - **Hyperedges**: derived views relating rules to the elements they match
//!   and schemes to the rules they use.
//!
//! Requests (`New*`) and patches (`*Patch`) validate themselves before they
//! reach the engine; see [`ModelError`].

#![deny(unsafe_code)]

mod element;
mod errors;
mod ids;
mod record;
mod rule;
mod scheme;
mod view;

pub use element::*;
pub use errors::*;
pub use ids::*;
pub use record::*;
pub use rule::*;
pub use scheme::*;
pub use view::*;
