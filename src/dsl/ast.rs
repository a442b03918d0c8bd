//! AST types for the filter language.

use serde::Serialize;
use std::fmt;

/// Grouping flavor of a container expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    /// `{ ... }` - every child must match
    All,
    /// `[ ... ]` - at least one child must match
    Any,
    /// `!{ ... }` - negated All
    NotAll,
    /// `![ ... ]` - negated Any
    NotAny,
}

impl GroupKind {
    pub fn opener(self) -> &'static str {
        match self {
            GroupKind::All => "{",
            GroupKind::Any => "[",
            GroupKind::NotAll => "!{",
            GroupKind::NotAny => "![",
        }
    }

    pub fn closer(self) -> char {
        match self {
            GroupKind::All | GroupKind::NotAll => '}',
            GroupKind::Any | GroupKind::NotAny => ']',
        }
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Eq,     // =
    Ne,     // !=
    Lt,     // <
    Le,     // <=
    Gt,     // >
    Ge,     // >=
    Exists, // ?=
    In,     // in
    NotIn,  // !in
}

impl Operator {
    /// Result of the comparison when the key is missing from the record, or
    /// when the operands cannot be compared. Negative tests pass vacuously;
    /// everything else requires a comparable value to be present.
    pub fn default_on_missing(self) -> bool {
        matches!(self, Operator::Ne | Operator::NotIn)
    }

    pub fn token(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Exists => "?=",
            Operator::In => "in",
            Operator::NotIn => "!in",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A literal value appearing on the right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Str(String),
    Num(f64),
    Bool(bool),
    /// Epoch seconds, UTC.
    Timestamp(i64),
    /// Homogeneous; only legal with `in` / `!in`.
    Array(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Timestamp(_) => "timestamp",
            Value::Array(_) => "array",
        }
    }
}

/// Render a number the way the language writes it: integral values without
/// a decimal point. Also used when a number has to be compared as text.
pub(crate) fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One node of a parsed filter.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Group {
        kind: GroupKind,
        children: Vec<AstNode>,
    },
    Condition {
        key: String,
        op: Operator,
        value: Value,
    },
    /// Kept in the tree so printing can reproduce it; evaluating backends
    /// skip it. `inline` means the comment trailed a condition on its line.
    Comment {
        text: String,
        inline: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_on_missing_matches_operator_family() {
        assert!(Operator::Ne.default_on_missing());
        assert!(Operator::NotIn.default_on_missing());
        for op in [
            Operator::Eq,
            Operator::Lt,
            Operator::Le,
            Operator::Gt,
            Operator::Ge,
            Operator::In,
            Operator::Exists,
        ] {
            assert!(!op.default_on_missing(), "{op} should default to false");
        }
    }

    #[test]
    fn numbers_render_like_source_literals() {
        assert_eq!(fmt_number(10.0), "10");
        assert_eq!(fmt_number(-7.0), "-7");
        assert_eq!(fmt_number(5.525), "5.525");
        assert_eq!(fmt_number(-0.5), "-0.5");
    }
}
