//! Hyperscore Scoring Language
//!
//! Rule scoring bodies are written in a small, Python-flavoured statement
//! language and run by a sandboxed tree-walking interpreter. A body sees two
//! names, `attrs` and `params`, and returns a number:
//!
//! ```text
//! rating = attrs.get('评分', 0)
//! if rating >= params.get('threshold', 4.5):
//!     return rating
//! return 0.0
//! ```
//!
//! The language has assignments, `if`/`elif`/`else`, `return` and `pass`,
//! but no loops, imports or function definitions. Calls are limited to a
//! fixed set of builtins and methods checked at compile time.

#![deny(unsafe_code)]

pub mod ast;
mod errors;
mod interpreter;
pub mod lexer;
pub mod parser;
mod value;

pub use errors::*;
pub use interpreter::{Program, ATTRS, PARAMS};
pub use parser::MAX_NESTING_DEPTH;
pub use value::Value;
