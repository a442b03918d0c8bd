//! Interchangeable interpreters for a parsed filter.
//!
//! Each backend implements [`Delegate`](crate::dsl::Delegate) and turns the
//! same AST into its own result: a record predicate, a relational filter
//! expression, canonical source text, a three-valued "could this match"
//! answer, or a static key-usage report.

pub(crate) mod compare;
pub mod keys;
pub mod predicate;
pub mod pretty;
pub mod query;
pub mod simulate;

pub use keys::{KeyUsage, KeyUsageDelegate};
pub use predicate::{PredicateDelegate, RecordPredicate};
pub use pretty::{Doc, PrettyDelegate};
pub use query::{Cast, QueryDelegate, QueryExpr};
pub use simulate::{Possibility, PossibilitySpace, SimPredicate, SimulationDelegate, Tri};
