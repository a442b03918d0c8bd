//! A small filtering language for structured records.
//!
//! Source text like
//!
//! ```text
//! {
//!   "state" = "NY"
//!   [ num_of_sat_test_takers >= 50, total_score > 1100 ]
//!   "closed" ?= false
//! }
//! ```
//!
//! compiles once into an AST which interchangeable backends then
//! interpret: match in-memory records, emit a relational filter for a
//! key/value column, print canonical source, decide whether a space of
//! possible values could ever match, or report which keys a match implies.
//!
//! ```
//! use sift::Filter;
//! use serde_json::json;
//!
//! let filter = Filter::parse("num = 50")?;
//! assert!(filter.matches(&json!({"num": "50"})));
//! assert_eq!(filter.to_dense(), r#"{"num"=50}"#);
//! # Ok::<(), sift::Error>(())
//! ```

pub mod backends;
pub mod config;
pub mod dsl;
pub mod filter;

pub use dsl::{AstNode, Delegate, Error, GroupKind, Operator, Value};
pub use filter::Filter;
