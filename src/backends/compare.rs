//! Loose value comparison shared by the record and simulation backends.

use std::cmp::Ordering;

use serde_json::Value as Json;

use crate::dsl::ast::{Operator, Value, fmt_number};

/// A record-side operand reduced to the kinds the language can compare.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Operand<'a> {
    Text(&'a str),
    Number(f64),
    Boolean(bool),
}

impl<'a> Operand<'a> {
    /// `None` for nulls, arrays and objects, which no operator can compare.
    pub(crate) fn from_json(value: &'a Json) -> Option<Self> {
        match value {
            Json::String(s) => Some(Operand::Text(s)),
            Json::Number(n) => n.as_f64().map(Operand::Number),
            Json::Bool(b) => Some(Operand::Boolean(*b)),
            _ => None,
        }
    }

    pub(crate) fn from_value(value: &'a Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(Operand::Text(s)),
            Value::Num(n) => Some(Operand::Number(*n)),
            Value::Bool(b) => Some(Operand::Boolean(*b)),
            Value::Timestamp(t) => Some(Operand::Number(*t as f64)),
            Value::Array(_) => None,
        }
    }
}

/// Equality with one-sided coercion: when text meets a number the text is
/// tried as a number first, falling back to comparing the number as text.
/// `None` means the operands cannot be compared at all.
fn loose_eq(actual: Operand, lit: Operand) -> Option<bool> {
    match (actual, lit) {
        (Operand::Text(a), Operand::Text(b)) => Some(a == b),
        (Operand::Number(a), Operand::Number(b)) => Some(a == b),
        (Operand::Boolean(a), Operand::Boolean(b)) => Some(a == b),
        (Operand::Text(s), Operand::Number(n)) | (Operand::Number(n), Operand::Text(s)) => {
            match s.trim().parse::<f64>() {
                Ok(parsed) => Some(parsed == n),
                Err(_) => Some(s == fmt_number(n)),
            }
        }
        _ => None,
    }
}

fn loose_ord(actual: Operand, lit: Operand) -> Option<Ordering> {
    match (actual, lit) {
        (Operand::Text(a), Operand::Text(b)) => Some(a.cmp(b)),
        (Operand::Number(a), Operand::Number(b)) => a.partial_cmp(&b),
        (Operand::Text(s), Operand::Number(n)) => match s.trim().parse::<f64>() {
            Ok(parsed) => parsed.partial_cmp(&n),
            Err(_) => Some(s.cmp(fmt_number(n).as_str())),
        },
        (Operand::Number(n), Operand::Text(s)) => match s.trim().parse::<f64>() {
            Ok(parsed) => n.partial_cmp(&parsed),
            Err(_) => Some(fmt_number(n).as_str().cmp(s)),
        },
        _ => None,
    }
}

/// Resolve one comparison of a record-side operand against a literal.
/// Uncomparable pairs resolve to the operator's boolean default instead of
/// erroring; records are heterogeneous and untrusted.
pub(crate) fn test(actual: Option<Operand>, op: Operator, literal: &Value) -> bool {
    let Some(actual) = actual else {
        return op.default_on_missing();
    };

    if let Value::Array(elems) = literal {
        let hit = elems.iter().any(|elem| {
            Operand::from_value(elem)
                .and_then(|lit| loose_eq(actual, lit))
                .unwrap_or(false)
        });
        return if op == Operator::NotIn { !hit } else { hit };
    }

    let Some(lit) = Operand::from_value(literal) else {
        return op.default_on_missing();
    };

    match op {
        Operator::Eq | Operator::In => loose_eq(actual, lit).unwrap_or(false),
        Operator::Ne | Operator::NotIn => loose_eq(actual, lit).map(|eq| !eq).unwrap_or(true),
        Operator::Lt => matches!(loose_ord(actual, lit), Some(Ordering::Less)),
        Operator::Le => matches!(
            loose_ord(actual, lit),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::Gt => matches!(loose_ord(actual, lit), Some(Ordering::Greater)),
        Operator::Ge => matches!(
            loose_ord(actual, lit),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        // presence tests are resolved by the backends before comparison
        Operator::Exists => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Operand<'_>> {
        Some(Operand::Text(s))
    }

    fn num(n: f64) -> Option<Operand<'static>> {
        Some(Operand::Number(n))
    }

    #[test]
    fn test_coercion_both_directions() {
        assert!(test(text("50"), Operator::Eq, &Value::Num(50.0)));
        assert!(test(num(50.0), Operator::Eq, &Value::Str("50".into())));
        assert!(test(text("50.0"), Operator::Eq, &Value::Num(50.0)));
        assert!(!test(text("abc"), Operator::Eq, &Value::Num(50.0)));
        assert!(test(text("abc"), Operator::Ne, &Value::Num(50.0)));
    }

    #[test]
    fn test_ordering_with_units_is_textual() {
        // "50 mph" is not a number, so it is compared as text against "50"
        assert!(!test(text("50 mph"), Operator::Lt, &Value::Num(50.0)));
        assert!(test(text("50 mph"), Operator::Gt, &Value::Num(50.0)));
    }

    #[test]
    fn test_uncomparable_pairs_use_defaults() {
        assert!(!test(text("yes"), Operator::Eq, &Value::Bool(true)));
        assert!(test(text("yes"), Operator::Ne, &Value::Bool(true)));
        assert!(!test(None, Operator::Gt, &Value::Num(1.0)));
        assert!(test(None, Operator::Ne, &Value::Num(1.0)));
    }

    #[test]
    fn test_membership_coerces_per_element() {
        let arr = Value::Array(vec![Value::Num(10.0), Value::Num(11.0)]);
        assert!(test(text("10"), Operator::In, &arr));
        assert!(!test(text("12"), Operator::In, &arr));
        assert!(test(text("12"), Operator::NotIn, &arr));

        let strs = Value::Array(vec![Value::Str("2006".into()), Value::Str("2007".into())]);
        assert!(test(num(2006.0), Operator::In, &strs));
    }

    #[test]
    fn test_timestamps_compare_as_numbers() {
        let t = Value::Timestamp(1_501_718_400);
        assert!(test(num(1_501_718_400.0), Operator::Eq, &t));
        assert!(test(num(1_501_718_401.0), Operator::Gt, &t));
        assert!(test(text("1501718400"), Operator::Eq, &t));
    }
}
