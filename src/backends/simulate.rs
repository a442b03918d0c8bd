//! Three-valued evaluation over a space of possible record values.
//!
//! Instead of one concrete record, the target maps each key that is known
//! to be set to the values it might hold. The result says whether the
//! filter is guaranteed to match, guaranteed not to, or undecidable.

use std::collections::HashMap;
use std::ops::{BitAnd, BitOr, Not};

use crate::backends::compare::{self, Operand};
use crate::dsl::ast::{Operator, Value};
use crate::dsl::delegate::Delegate;

/// Kleene three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    True,
    False,
    Unknown,
}

impl Tri {
    pub fn from_bool(b: bool) -> Tri {
        if b { Tri::True } else { Tri::False }
    }
}

impl BitAnd for Tri {
    type Output = Tri;

    fn bitand(self, rhs: Tri) -> Tri {
        match (self, rhs) {
            (Tri::False, _) | (_, Tri::False) => Tri::False,
            (Tri::True, Tri::True) => Tri::True,
            _ => Tri::Unknown,
        }
    }
}

impl BitOr for Tri {
    type Output = Tri;

    fn bitor(self, rhs: Tri) -> Tri {
        match (self, rhs) {
            (Tri::True, _) | (_, Tri::True) => Tri::True,
            (Tri::False, Tri::False) => Tri::False,
            _ => Tri::Unknown,
        }
    }
}

impl Not for Tri {
    type Output = Tri;

    fn not(self) -> Tri {
        match self {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Unknown => Tri::Unknown,
        }
    }
}

/// What a key might hold. Keys absent from the space are known absent.
#[derive(Debug, Clone, PartialEq)]
pub enum Possibility {
    /// The key is set but could hold anything.
    Anything,
    /// The key holds one of these values.
    OneOf(Vec<Value>),
}

pub type PossibilitySpace = HashMap<String, Possibility>;

type SimTest = Box<dyn Fn(&PossibilitySpace) -> Tri + Send + Sync>;

/// Fold output: a tri-state test, or a comment pseudo-node.
pub enum SimNode {
    Test(SimTest),
    Comment,
}

/// Builds tri-state predicates over a possibility space.
pub struct SimulationDelegate;

fn tests_of(children: Vec<SimNode>) -> Vec<SimTest> {
    children
        .into_iter()
        .filter_map(|child| match child {
            SimNode::Test(test) => Some(test),
            SimNode::Comment => None,
        })
        .collect()
}

fn negate(node: SimNode) -> SimNode {
    match node {
        SimNode::Test(test) => SimNode::Test(Box::new(move |space| !test(space))),
        SimNode::Comment => SimNode::Comment,
    }
}

impl Delegate for SimulationDelegate {
    type Output = SimNode;

    fn mk_all(&self, children: Vec<SimNode>) -> SimNode {
        let tests = tests_of(children);
        SimNode::Test(Box::new(move |space| {
            tests.iter().fold(Tri::True, |acc, t| acc & t(space))
        }))
    }

    fn mk_any(&self, children: Vec<SimNode>) -> SimNode {
        let tests = tests_of(children);
        SimNode::Test(Box::new(move |space| {
            tests.iter().fold(Tri::False, |acc, t| acc | t(space))
        }))
    }

    fn mk_not_all(&self, children: Vec<SimNode>) -> SimNode {
        negate(self.mk_all(children))
    }

    fn mk_not_any(&self, children: Vec<SimNode>) -> SimNode {
        negate(self.mk_any(children))
    }

    fn mk_cmp(&self, key: &str, op: Operator, value: &Value) -> SimNode {
        let key = key.to_string();
        if op == Operator::Exists {
            // a key in the space is set, whatever its value; always definite
            let expected = matches!(value, Value::Bool(true));
            return SimNode::Test(Box::new(move |space| {
                Tri::from_bool(space.contains_key(&key) == expected)
            }));
        }
        let value = value.clone();
        SimNode::Test(Box::new(move |space| match space.get(&key) {
            None => Tri::from_bool(op.default_on_missing()),
            Some(Possibility::Anything) => Tri::Unknown,
            Some(Possibility::OneOf(vals)) => {
                // definite only when every possible value agrees
                let mut any_pass = false;
                let mut any_fail = false;
                for val in vals {
                    if compare::test(Operand::from_value(val), op, &value) {
                        any_pass = true;
                    } else {
                        any_fail = true;
                    }
                }
                match (any_pass, any_fail) {
                    (true, false) => Tri::True,
                    (false, true) => Tri::False,
                    _ => Tri::Unknown,
                }
            }
        }))
    }

    fn mk_comment(&self, _text: &str, _inline: bool) -> SimNode {
        SimNode::Comment
    }
}

/// A compiled, reusable tri-state test.
pub struct SimPredicate {
    test: SimTest,
}

impl SimPredicate {
    pub(crate) fn new(node: SimNode) -> Self {
        let test = match node {
            SimNode::Test(test) => test,
            SimNode::Comment => Box::new(|_: &PossibilitySpace| Tri::True) as SimTest,
        };
        SimPredicate { test }
    }

    pub fn eval(&self, space: &PossibilitySpace) -> Tri {
        (self.test)(space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parser::parse;

    fn sim(src: &str) -> SimPredicate {
        let parsed = parse(src).unwrap();
        SimPredicate::new(parsed.root.fold(&SimulationDelegate))
    }

    fn space() -> PossibilitySpace {
        let mut space = PossibilitySpace::new();
        space.insert("lang".into(), Possibility::OneOf(vec![Value::Str("en".into())]));
        space.insert("birth_year".into(), Possibility::Anything);
        space.insert(
            "gender".into(),
            Possibility::OneOf(vec![Value::Str("male".into()), Value::Str("female".into())]),
        );
        space.insert(
            "grad_year".into(),
            Possibility::OneOf(vec![
                Value::Str("2006".into()),
                Value::Str("2007".into()),
                Value::Num(2008.0),
            ]),
        );
        space.insert(
            "irregular".into(),
            Possibility::OneOf(vec![
                Value::Str("1".into()),
                Value::Num(2.0),
                Value::Str("three".into()),
                Value::Num(4.0),
            ]),
        );
        space
    }

    #[test]
    fn test_truth_tables() {
        use Tri::*;
        for (a, b, and, or) in [
            (True, True, True, True),
            (True, False, False, True),
            (True, Unknown, Unknown, True),
            (False, False, False, False),
            (False, Unknown, False, Unknown),
            (Unknown, Unknown, Unknown, Unknown),
        ] {
            assert_eq!(a & b, and);
            assert_eq!(b & a, and);
            assert_eq!(a | b, or);
            assert_eq!(b | a, or);
        }
        assert_eq!(!True, False);
        assert_eq!(!False, True);
        assert_eq!(!Unknown, Unknown);
    }

    #[test]
    fn test_guaranteed_matches() {
        let space = space();
        for src in [
            "lang ?= true # comment\n",
            "birth_year ?= true",
            "fake_key ?= false",
            "lang = 'en'",
            "lang != 'hi'",
            "gender != 'dude'",
            "gender > 'dude'",
            "gender >= 'female'",
            "gender in ('male', 'dude', 'lady', 'female')",
            "gender !in ('dude', 'lady')",
            "grad_year in ('2006', '2007', '2008', '2009')",
            "grad_year in (2006, 2007, 2008, 2009)",
            "irregular != 'fifty'",
            "irregular !in ('8', '9')",
        ] {
            assert_eq!(sim(src).eval(&space), Tri::True, "{src}");
        }
    }

    #[test]
    fn test_guaranteed_misses() {
        let space = space();
        for src in [
            "lang ?= false",
            "birth_year ?= false",
            "fake_key ?= true",
            "lang != 'en'",
            "lang = 'hi'",
            "gender = 'dude'",
            "gender < 'dude'",
            "gender < 'female'",
            "gender !in ('male', 'dude', 'lady', 'female')",
            "gender in ('dude', 'lady')",
            "grad_year < 2003",
            "irregular = 7",
            "irregular in (6, 7)",
        ] {
            assert_eq!(sim(src).eval(&space), Tri::False, "{src}");
        }
    }

    #[test]
    fn test_undecidable() {
        let space = space();
        for src in [
            "birth_year = '1995'",
            "birth_year < '1995'",
            "birth_year in ('1995', '1996')",
            "birth_year !in ('1995', '1996')",
            "gender in ('male', 'dude')",
            "gender !in ('male', 'dude')",
            "grad_year >= 2007",
            "grad_year = 2007",
            "irregular = 1",
            "irregular in (1, 9)",
        ] {
            assert_eq!(sim(src).eval(&space), Tri::Unknown, "{src}");
        }
    }

    #[test]
    fn test_group_combinations() {
        let space = space();
        let yes = "lang = 'en'";
        let no = "lang = 'hi'";
        let maybe = "birth_year = '1995'";

        assert_eq!(sim(&format!("{yes}\n{no}")).eval(&space), Tri::False);
        assert_eq!(sim(&format!("!{{ {yes}\n{no} }}")).eval(&space), Tri::True);
        assert_eq!(sim(&format!("[{yes}\n{no}]")).eval(&space), Tri::True);
        assert_eq!(sim(&format!("![{yes}\n{no}]")).eval(&space), Tri::False);

        assert_eq!(sim(&format!("{yes}\n{maybe}")).eval(&space), Tri::Unknown);
        assert_eq!(
            sim(&format!("!{{ {yes}\n{maybe} }}")).eval(&space),
            Tri::Unknown
        );
        assert_eq!(sim(&format!("[{yes}\n{maybe}]")).eval(&space), Tri::True);
        assert_eq!(sim(&format!("![{yes}\n{maybe}]")).eval(&space), Tri::False);

        assert_eq!(sim(&format!("{no}\n{maybe}")).eval(&space), Tri::False);
        assert_eq!(sim(&format!("[{no}\n{maybe}]")).eval(&space), Tri::Unknown);
    }

    #[test]
    fn test_monotone_under_added_possibilities() {
        let mut narrow = PossibilitySpace::new();
        narrow.insert("k".into(), Possibility::OneOf(vec![Value::Num(5.0)]));

        let mut wide = PossibilitySpace::new();
        wide.insert(
            "k".into(),
            Possibility::OneOf(vec![Value::Num(5.0), Value::Num(50.0)]),
        );

        for src in ["k = 5", "k != 5", "k < 10", "k >= 10", "k in (5, 6)"] {
            let pred = sim(src);
            let before = pred.eval(&narrow);
            let after = pred.eval(&wide);
            // a definite answer may only degrade to Unknown, never flip
            if before != after {
                assert_eq!(after, Tri::Unknown, "{src}");
            }
        }
    }

    #[test]
    fn test_empty_groups() {
        let space = space();
        assert_eq!(sim("{}").eval(&space), Tri::True);
        assert_eq!(sim("[]").eval(&space), Tri::False);
        assert_eq!(sim("!{}").eval(&space), Tri::False);
        assert_eq!(sim("![]").eval(&space), Tri::True);
    }
}
