//! The filter expression language.
//!
//! Syntax:
//!   { expr, expr }          - all must match (the implicit top level)
//!   [ expr, expr ]          - at least one must match
//!   !{ ... } / ![ ... ]     - negated forms
//!   key = value             - comparison (=, !=, <, <=, >, >=)
//!   key ?= true             - key existence test
//!   key in (v1, v2)         - membership (also !in)
//!   timestamp(2017-08-03)   - date literal, optional HH:MM
//!   # comment               - to end of line
//!
//! Expressions are separated by commas or newlines. Keys are bare words or
//! quoted strings; values are quoted strings, numbers, booleans, timestamps
//! or homogeneous arrays.

pub mod ast;
pub mod delegate;
pub mod error;
pub mod lexer;
pub mod parser;

pub use ast::{AstNode, GroupKind, Operator, Value};
pub use delegate::Delegate;
pub use error::Error;
