//! Static key-usage analysis.
//!
//! Without evaluating any record, work out which keys every matching
//! record is guaranteed to have set and which it is guaranteed not to.
//! Useful for checking a filter against a known schema up front.

use std::collections::BTreeSet;

use crate::dsl::ast::{Operator, Value};
use crate::dsl::delegate::Delegate;

/// What a filter implies about the keys it references. The two sets are
/// disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyUsage {
    /// Keys a matching record must have set.
    pub present: BTreeSet<String>,
    /// Keys a matching record must not have set.
    pub absent: BTreeSet<String>,
}

/// Fold state: evidence about keys, tracked per negation polarity so that
/// `mk_not_*` can flip it without revisiting the subtree.
#[derive(Debug, Clone, Default)]
pub struct KeyFacts {
    /// Required present by a `?= true` test in this context.
    required: BTreeSet<String>,
    /// Required absent by a `?= false` test in this context.
    excluded: BTreeSet<String>,
    /// Touched by an ordinary comparison in this context. Counts as
    /// presence evidence: a comparison only holds non-vacuously when the
    /// key is there.
    compared: BTreeSet<String>,
    /// Same, but under an odd number of negations; inert unless another
    /// negation flips it back.
    compared_negated: BTreeSet<String>,
}

impl KeyFacts {
    fn merge(children: Vec<KeyFacts>) -> KeyFacts {
        let mut out = KeyFacts::default();
        for child in children {
            out.required.extend(child.required);
            out.excluded.extend(child.excluded);
            out.compared.extend(child.compared);
            out.compared_negated.extend(child.compared_negated);
        }
        out
    }

    fn negate(mut self) -> KeyFacts {
        std::mem::swap(&mut self.required, &mut self.excluded);
        std::mem::swap(&mut self.compared, &mut self.compared_negated);
        self
    }

    /// Resolve the evidence. Presence wins a conflict: a key both compared
    /// somewhere and `?= false` somewhere else stays out of `absent`.
    pub fn finish(self) -> KeyUsage {
        let mut present = self.required;
        present.extend(self.compared);
        let absent = self.excluded.difference(&present).cloned().collect();
        KeyUsage { present, absent }
    }
}

/// Collects key evidence from the tree.
pub struct KeyUsageDelegate;

impl Delegate for KeyUsageDelegate {
    type Output = KeyFacts;

    fn mk_all(&self, children: Vec<KeyFacts>) -> KeyFacts {
        KeyFacts::merge(children)
    }

    fn mk_any(&self, children: Vec<KeyFacts>) -> KeyFacts {
        KeyFacts::merge(children)
    }

    fn mk_not_all(&self, children: Vec<KeyFacts>) -> KeyFacts {
        KeyFacts::merge(children).negate()
    }

    fn mk_not_any(&self, children: Vec<KeyFacts>) -> KeyFacts {
        KeyFacts::merge(children).negate()
    }

    fn mk_cmp(&self, key: &str, op: Operator, value: &Value) -> KeyFacts {
        let mut facts = KeyFacts::default();
        match op {
            Operator::Exists => {
                if matches!(value, Value::Bool(true)) {
                    facts.required.insert(key.to_string());
                } else {
                    facts.excluded.insert(key.to_string());
                }
            }
            _ => {
                facts.compared.insert(key.to_string());
            }
        }
        facts
    }

    fn mk_comment(&self, _text: &str, _inline: bool) -> KeyFacts {
        KeyFacts::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse;

    fn usage(src: &str) -> KeyUsage {
        parse(src).unwrap().root.fold(&KeyUsageDelegate).finish()
    }

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_comparisons_imply_presence() {
        let u = usage("x = 1, y = true");
        assert_eq!(u.present, set(&["x", "y"]));
        assert_eq!(u.absent, set(&[]));
    }

    #[test]
    fn test_existence_tests_split_by_operand() {
        let u = usage("x ?= true, y ?= false");
        assert_eq!(u.present, set(&["x"]));
        assert_eq!(u.absent, set(&["y"]));
    }

    #[test]
    fn test_negation_swaps_the_sets() {
        let u = usage("!{x ?= true, y ?= false}");
        assert_eq!(u.present, set(&["y"]));
        assert_eq!(u.absent, set(&["x"]));
    }

    #[test]
    fn test_double_negation_restores_comparisons() {
        // `z = "a"` and friends sit under two negations, so they count as
        // presence evidence again; `a ?= false` loses to the comparison
        // on `a` and drops out of the absent set.
        let u = usage(
            r#"
            !{
                [
                    x ?= true
                    y ?= false
                ]
                ![
                    z = "a"
                    {
                      a = 1
                      b != 2
                      c > 10
                      d < 9
                    }
                ]
            }
            a ?= false
            "#,
        );
        assert_eq!(u.present, set(&["a", "b", "c", "d", "y", "z"]));
        assert_eq!(u.absent, set(&["x"]));
    }

    #[test]
    fn test_singly_negated_comparison_is_inert() {
        let u = usage("!{ a = 1 }");
        assert_eq!(u.present, set(&[]));
        assert_eq!(u.absent, set(&[]));
    }

    #[test]
    fn test_comments_contribute_nothing() {
        let u = usage("# note\nx ?= true # trailing");
        assert_eq!(u.present, set(&["x"]));
        assert_eq!(u.absent, set(&[]));
    }
}
