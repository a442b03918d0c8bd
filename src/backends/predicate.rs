//! Boolean predicate over a single record (a key to value mapping).

use serde_json::{Map, Value as Json};

use crate::backends::compare::{self, Operand};
use crate::dsl::ast::{Operator, Value};
use crate::dsl::delegate::Delegate;

type Test = Box<dyn Fn(&Map<String, Json>) -> bool + Send + Sync>;

/// Fold output: a record test, or a comment pseudo-node that groups skip.
pub enum PredNode {
    Test(Test),
    Comment,
}

/// Builds record predicates. Matching never errors; a missing key or an
/// uncomparable value resolves to the operator's boolean default.
pub struct PredicateDelegate;

fn tests_of(children: Vec<PredNode>) -> Vec<Test> {
    children
        .into_iter()
        .filter_map(|child| match child {
            PredNode::Test(test) => Some(test),
            PredNode::Comment => None,
        })
        .collect()
}

fn negate(node: PredNode) -> PredNode {
    match node {
        PredNode::Test(test) => PredNode::Test(Box::new(move |record| !test(record))),
        PredNode::Comment => PredNode::Comment,
    }
}

impl Delegate for PredicateDelegate {
    type Output = PredNode;

    fn mk_all(&self, children: Vec<PredNode>) -> PredNode {
        let tests = tests_of(children);
        PredNode::Test(Box::new(move |record| tests.iter().all(|t| t(record))))
    }

    fn mk_any(&self, children: Vec<PredNode>) -> PredNode {
        let tests = tests_of(children);
        PredNode::Test(Box::new(move |record| tests.iter().any(|t| t(record))))
    }

    fn mk_not_all(&self, children: Vec<PredNode>) -> PredNode {
        negate(self.mk_all(children))
    }

    fn mk_not_any(&self, children: Vec<PredNode>) -> PredNode {
        negate(self.mk_any(children))
    }

    fn mk_cmp(&self, key: &str, op: Operator, value: &Value) -> PredNode {
        let key = key.to_string();
        if op == Operator::Exists {
            // presence only; a key set to null still counts as present
            let expected = matches!(value, Value::Bool(true));
            return PredNode::Test(Box::new(move |record| {
                record.contains_key(&key) == expected
            }));
        }
        let value = value.clone();
        PredNode::Test(Box::new(move |record| match record.get(&key) {
            None => op.default_on_missing(),
            Some(actual) => compare::test(Operand::from_json(actual), op, &value),
        }))
    }

    fn mk_comment(&self, _text: &str, _inline: bool) -> PredNode {
        PredNode::Comment
    }
}

/// A compiled, reusable record test; safe to share across threads.
pub struct RecordPredicate {
    test: Test,
}

impl RecordPredicate {
    pub(crate) fn new(node: PredNode) -> Self {
        let test = match node {
            PredNode::Test(test) => test,
            // a lone comment matches everything, like an empty filter
            PredNode::Comment => Box::new(|_: &Map<String, Json>| true) as Test,
        };
        RecordPredicate { test }
    }

    /// Evaluate against a JSON value. Anything that is not an object is
    /// treated as the empty record.
    pub fn matches(&self, record: &Json) -> bool {
        match record {
            Json::Object(map) => (self.test)(map),
            _ => (self.test)(&Map::new()),
        }
    }

    pub fn matches_map(&self, record: &Map<String, Json>) -> bool {
        (self.test)(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse;
    use serde_json::json;

    fn predicate(src: &str) -> RecordPredicate {
        let parsed = parse(src).unwrap();
        RecordPredicate::new(parsed.root.fold(&PredicateDelegate))
    }

    #[test]
    fn test_empty_group_identities() {
        let record = json!({"a": 1});
        assert!(predicate("").matches(&record));
        assert!(predicate("{}").matches(&record));
        assert!(!predicate("[]").matches(&record));
        assert!(!predicate("!{}").matches(&record));
        assert!(predicate("![]").matches(&record));
    }

    #[test]
    fn test_missing_key_defaults() {
        let record = json!({"other": 1});
        assert!(predicate("k != 5").matches(&record));
        assert!(predicate("k !in (5, 6)").matches(&record));
        assert!(predicate("k ?= false").matches(&record));
        assert!(!predicate("k = 5").matches(&record));
        assert!(!predicate("k > 5").matches(&record));
        assert!(!predicate("k < 5").matches(&record));
        assert!(!predicate("k >= 5").matches(&record));
        assert!(!predicate("k <= 5").matches(&record));
        assert!(!predicate("k in (5, 6)").matches(&record));
        assert!(!predicate("k ?= true").matches(&record));
    }

    #[test]
    fn test_null_and_non_object_records_are_empty() {
        assert!(predicate("k != 50").matches(&Json::Null));
        assert!(!predicate("k = 50").matches(&Json::Null));
        assert!(!predicate("k ?= true").matches(&Json::Null));
        assert!(predicate("k ?= false").matches(&Json::Null));
    }

    #[test]
    fn test_existence_sees_null_values() {
        let record = json!({"k": null});
        assert!(predicate("k ?= true").matches(&record));
        assert!(!predicate("k ?= false").matches(&record));
        // but null never compares
        assert!(!predicate("k = 1").matches(&record));
        assert!(predicate("k != 1").matches(&record));
    }

    #[test]
    fn test_string_number_coercion() {
        assert!(predicate("n = 50").matches(&json!({"n": "50"})));
        assert!(predicate("n = \"50\"").matches(&json!({"n": 50})));
        assert!(!predicate("n = 50").matches(&json!({"n": "abc"})));
        assert!(predicate("n != 50").matches(&json!({"n": "abc"})));
        assert!(predicate("n = 1120").matches(&json!({"n": "1120.0"})));
        assert!(!predicate("n = \"1120\"").matches(&json!({"n": "1120.0"})));
    }

    #[test]
    fn test_group_semantics() {
        let hit = json!({"a": 320, "b": 10});
        let miss = json!({"a": 200, "b": 10});
        let band = predicate("{ a >= 300, a < 350 }");
        assert!(band.matches(&hit));
        assert!(!band.matches(&miss));

        let not_band = predicate("!{ a >= 300, a < 350 }");
        assert!(!not_band.matches(&hit));
        assert!(not_band.matches(&miss));

        let union = predicate("[ b = 10, b = 11 ]");
        assert!(union.matches(&hit));
        assert!(!union.matches(&json!({"b": 12})));

        let not_union = predicate("![ b = 10, b = 11 ]");
        assert!(!not_union.matches(&hit));
        assert!(not_union.matches(&json!({"b": 12})));
    }

    #[test]
    fn test_membership() {
        let p = predicate("n in (10, 11, 12)");
        assert!(p.matches(&json!({"n": 11})));
        assert!(p.matches(&json!({"n": "11"})));
        assert!(!p.matches(&json!({"n": 13})));

        let p = predicate("n !in (10, 11, 12)");
        assert!(!p.matches(&json!({"n": 11})));
        assert!(p.matches(&json!({"n": 13})));
    }

    #[test]
    fn test_comments_are_skipped() {
        let p = predicate("# note\nn = 50 # inline\n# tail");
        assert!(p.matches(&json!({"n": 50})));
        assert!(!p.matches(&json!({"n": 51})));

        // a comment inside an Any group must not satisfy the group
        let p = predicate("[\n # note\n n = 50\n]");
        assert!(!p.matches(&json!({"n": 51})));
    }

    #[test]
    fn test_quoted_and_dollar_keys() {
        let record = json!({"number of takers": 99, "$pct": "85"});
        assert!(predicate("\"number of takers\" = 99").matches(&record));
        assert!(predicate("$pct = \"85\"").matches(&record));
        assert!(predicate("'$pct' ?= true").matches(&record));
    }

    #[test]
    fn test_boolean_values() {
        assert!(predicate("flag = true").matches(&json!({"flag": true})));
        assert!(!predicate("flag = true").matches(&json!({"flag": false})));
        // bool against text is uncomparable, so `=` fails and `!=` passes
        assert!(!predicate("flag = true").matches(&json!({"flag": "true"})));
        assert!(predicate("flag != true").matches(&json!({"flag": "true"})));
    }
}
