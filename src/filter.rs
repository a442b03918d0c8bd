//! The compiled-filter entry point.

use std::collections::BTreeSet;

use serde_json::Value as Json;

use crate::backends::keys::{KeyUsage, KeyUsageDelegate};
use crate::backends::predicate::{PredicateDelegate, RecordPredicate};
use crate::backends::pretty::PrettyDelegate;
use crate::backends::query::{QueryDelegate, QueryExpr, QueryNode};
use crate::backends::simulate::{SimPredicate, SimulationDelegate};
use crate::dsl::ast::AstNode;
use crate::dsl::delegate::Delegate;
use crate::dsl::error::Result;
use crate::dsl::parser;

/// A filter compiled from source text. Parsing happens once; the tree is
/// immutable afterwards and can be walked by any number of backends from
/// any number of threads.
#[derive(Debug, Clone)]
pub struct Filter {
    source: String,
    root: AstNode,
    keys: BTreeSet<String>,
}

impl Filter {
    /// Compile filter source. Fails with [`Error`](crate::dsl::Error) on
    /// malformed or invalid input; a compiled filter never fails later.
    pub fn parse(source: &str) -> Result<Filter> {
        let parsed = parser::parse(source)?;
        Ok(Filter {
            source: source.to_string(),
            root: parsed.root,
            keys: parsed.keys,
        })
    }

    /// The verbatim source this filter was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every key the filter references, sorted.
    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    /// Walk the tree with a delegate of your own.
    pub fn fold<D: Delegate>(&self, delegate: &D) -> D::Output {
        self.root.fold(delegate)
    }

    /// A reusable boolean test over single records.
    pub fn predicate(&self) -> RecordPredicate {
        RecordPredicate::new(self.fold(&PredicateDelegate))
    }

    /// Match one record. Compiles a fresh predicate; prefer
    /// [`Filter::predicate`] when testing many records.
    pub fn matches(&self, record: &Json) -> bool {
        self.predicate().matches(record)
    }

    /// Keep the records that match.
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a Json>
    where
        I: IntoIterator<Item = &'a Json>,
    {
        let predicate = self.predicate();
        records
            .into_iter()
            .filter(|record| predicate.matches(record))
            .collect()
    }

    /// The relational expression for a schemaless key/value column.
    pub fn to_query(&self) -> QueryExpr {
        match self.fold(&QueryDelegate) {
            QueryNode::Expr(expr) => expr,
            QueryNode::Comment => QueryExpr::Const(true),
        }
    }

    /// SQL text of [`Filter::to_query`] over the named column.
    pub fn to_sql(&self, column: &str) -> String {
        self.to_query().to_sql(column)
    }

    /// Canonical single-line rendering, comments dropped.
    pub fn to_dense(&self) -> String {
        self.fold(&PrettyDelegate).render(true)
    }

    /// Canonical multi-line rendering, comments kept.
    pub fn to_pretty(&self) -> String {
        self.fold(&PrettyDelegate).render(false)
    }

    /// A reusable three-valued test over a possibility space.
    pub fn sim_predicate(&self) -> SimPredicate {
        SimPredicate::new(self.fold(&SimulationDelegate))
    }

    /// Which keys a matching record must and must not have.
    pub fn key_usage(&self) -> KeyUsage {
        self.fold(&KeyUsageDelegate).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::Error;
    use serde_json::json;

    #[test]
    fn test_parse_errors_carry_offsets() {
        for src in ["[", "a = 1 }", "{a=1}{b=2}"] {
            let err = Filter::parse(src).unwrap_err();
            assert!(matches!(err, Error::Syntax { .. }), "{src}");
            assert!(err.offset() <= src.len(), "{src}");
        }
    }

    #[test]
    fn test_keys_are_exposed() {
        let filter = Filter::parse("a = 1\n[ b ?= true, \"c d\" < 5 ]").unwrap();
        let keys: Vec<&str> = filter.keys().iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c d"]);
        assert_eq!(filter.source(), "a = 1\n[ b ?= true, \"c d\" < 5 ]");
    }

    #[test]
    fn test_apply_keeps_matching_records() {
        let records = vec![json!({"n": 10}), json!({"n": 50}), json!({"n": "50"})];
        let filter = Filter::parse("n = 50").unwrap();
        let matched = filter.apply(&records);
        assert_eq!(matched.len(), 2);
        assert!(filter.matches(&records[1]));
        assert!(!filter.matches(&records[0]));
    }

    #[test]
    fn test_one_filter_many_backends() {
        let filter = Filter::parse("a ?= true, b ?= true").unwrap();
        assert_eq!(filter.to_dense(), r#"{"a"?=true,"b"?=true}"#);
        assert_eq!(filter.to_sql("hs"), "(hs ?& ARRAY['a','b'])");
        let usage = filter.key_usage();
        assert!(usage.present.contains("a") && usage.present.contains("b"));
        assert!(filter.matches(&json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_compiled_filter_is_shareable_across_threads() {
        let filter = Filter::parse("n >= 10, n < 20").unwrap();
        let predicate = filter.predicate();
        std::thread::scope(|scope| {
            for chunk in 0..4 {
                let filter = &filter;
                let predicate = &predicate;
                scope.spawn(move || {
                    for i in 0..50 {
                        let record = json!({ "n": chunk * 50 + i });
                        let expected = (10..20).contains(&(chunk * 50 + i));
                        assert_eq!(predicate.matches(&record), expected);
                        assert_eq!(filter.matches(&record), expected);
                    }
                });
            }
        });
    }
}
