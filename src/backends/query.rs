//! Relational filter expressions for a schemaless key/value column.
//!
//! The output is a passive expression tree; the caller's query engine owns
//! execution. `to_sql` renders the hstore dialect the tree was designed
//! around, but consumers are free to walk the tree themselves.

use serde::Serialize;

use crate::dsl::ast::{Operator, Value, fmt_number};
use crate::dsl::delegate::Delegate;

/// Cast applied to the raw column text before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cast {
    Text,
    Integer,
    Numeric,
}

impl Cast {
    fn suffix(self) -> &'static str {
        match self {
            Cast::Text => "",
            Cast::Integer => "::integer",
            Cast::Numeric => "::numeric",
        }
    }
}

fn cast_for(value: &Value) -> Cast {
    match value {
        Value::Num(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                Cast::Integer
            } else {
                Cast::Numeric
            }
        }
        Value::Timestamp(_) => Cast::Integer,
        // arrays are homogeneous, so the first element decides
        Value::Array(elems) => elems.first().map(cast_for).unwrap_or(Cast::Text),
        Value::Str(_) | Value::Bool(_) => Cast::Text,
    }
}

/// A filter compiled for the key/value column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryExpr {
    Const(bool),
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
    Not(Box<QueryExpr>),
    /// `column ? 'key'`, negated when `expected` is false.
    HasKey { key: String, expected: bool },
    /// `column ?& ARRAY[...]`: the collapsed form of an all-of existence group.
    HasAllKeys(Vec<String>),
    /// `column ?| ARRAY[...]`: the collapsed form of an any-of existence group.
    HasAnyKeys(Vec<String>),
    /// The raw text under `key` matches the cast's shape, so casting is safe.
    TypeCheck { key: String, cast: Cast },
    Cmp {
        key: String,
        op: Operator,
        value: Value,
        cast: Cast,
    },
}

/// Fold output: an expression, or a comment pseudo-node that groups skip.
pub enum QueryNode {
    Expr(QueryExpr),
    Comment,
}

/// Compiles a filter into a [`QueryExpr`].
pub struct QueryDelegate;

fn exprs_of(children: Vec<QueryNode>) -> Vec<QueryExpr> {
    children
        .into_iter()
        .filter_map(|child| match child {
            QueryNode::Expr(expr) => Some(expr),
            QueryNode::Comment => None,
        })
        .collect()
}

/// A group of two or more positive existence tests over distinct keys can
/// collapse into one multi-key containment test. Any other child shape
/// (negated existence, comparisons, nested groups, duplicate keys) keeps
/// the plain boolean form; the rewrite must never change semantics.
fn existence_keys(exprs: &[QueryExpr]) -> Option<Vec<String>> {
    if exprs.len() < 2 {
        return None;
    }
    let mut keys: Vec<String> = Vec::with_capacity(exprs.len());
    for expr in exprs {
        match expr {
            QueryExpr::HasKey {
                key,
                expected: true,
            } if !keys.contains(key) => keys.push(key.clone()),
            _ => return None,
        }
    }
    Some(keys)
}

fn all_of(mut exprs: Vec<QueryExpr>) -> QueryExpr {
    match exprs.len() {
        0 => QueryExpr::Const(true),
        1 => exprs.remove(0),
        _ => match existence_keys(&exprs) {
            Some(keys) => QueryExpr::HasAllKeys(keys),
            None => QueryExpr::And(exprs),
        },
    }
}

fn any_of(mut exprs: Vec<QueryExpr>) -> QueryExpr {
    match exprs.len() {
        0 => QueryExpr::Const(false),
        1 => exprs.remove(0),
        _ => match existence_keys(&exprs) {
            Some(keys) => QueryExpr::HasAnyKeys(keys),
            None => QueryExpr::Or(exprs),
        },
    }
}

impl Delegate for QueryDelegate {
    type Output = QueryNode;

    fn mk_all(&self, children: Vec<QueryNode>) -> QueryNode {
        QueryNode::Expr(all_of(exprs_of(children)))
    }

    fn mk_any(&self, children: Vec<QueryNode>) -> QueryNode {
        QueryNode::Expr(any_of(exprs_of(children)))
    }

    fn mk_not_all(&self, children: Vec<QueryNode>) -> QueryNode {
        QueryNode::Expr(QueryExpr::Not(Box::new(all_of(exprs_of(children)))))
    }

    fn mk_not_any(&self, children: Vec<QueryNode>) -> QueryNode {
        QueryNode::Expr(QueryExpr::Not(Box::new(any_of(exprs_of(children)))))
    }

    fn mk_cmp(&self, key: &str, op: Operator, value: &Value) -> QueryNode {
        if op == Operator::Exists {
            return QueryNode::Expr(QueryExpr::HasKey {
                key: key.to_string(),
                expected: matches!(value, Value::Bool(true)),
            });
        }

        let cast = cast_for(value);
        let cmp = QueryExpr::Cmp {
            key: key.to_string(),
            op,
            value: value.clone(),
            cast,
        };
        let has_key = QueryExpr::HasKey {
            key: key.to_string(),
            expected: true,
        };
        let type_check = (cast != Cast::Text).then(|| QueryExpr::TypeCheck {
            key: key.to_string(),
            cast,
        });

        // Comparisons against a missing key must be deterministic instead
        // of inheriting SQL null semantics: negative tests match records
        // without the key (or with text the cast rejects), everything else
        // requires the key to be present.
        let expr = match op {
            Operator::Ne | Operator::NotIn => {
                let mut parts = vec![QueryExpr::Not(Box::new(has_key))];
                if let Some(check) = type_check {
                    parts.push(QueryExpr::Not(Box::new(check)));
                }
                parts.push(cmp);
                QueryExpr::Or(parts)
            }
            _ => {
                let mut parts = vec![has_key];
                if let Some(check) = type_check {
                    parts.push(check);
                }
                parts.push(cmp);
                QueryExpr::And(parts)
            }
        };
        QueryNode::Expr(expr)
    }

    fn mk_comment(&self, _text: &str, _inline: bool) -> QueryNode {
        QueryNode::Comment
    }
}

fn sql_str(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn sql_op(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "=",
        Operator::Ne => "!=",
        Operator::Lt => "<",
        Operator::Le => "<=",
        Operator::Gt => ">",
        Operator::Ge => ">=",
        Operator::In => "IN",
        Operator::NotIn => "NOT IN",
        // existence renders through HasKey, never through Cmp
        Operator::Exists => "=",
    }
}

fn sql_value(value: &Value) -> String {
    match value {
        Value::Str(s) => sql_str(s),
        Value::Num(n) => fmt_number(*n),
        Value::Bool(true) => "'true'".to_string(),
        Value::Bool(false) => "'false'".to_string(),
        Value::Timestamp(t) => t.to_string(),
        Value::Array(elems) => {
            let elems: Vec<String> = elems.iter().map(sql_value).collect();
            format!("({})", elems.join(","))
        }
    }
}

impl QueryExpr {
    /// Render as a SQL predicate over an hstore-style column. The string
    /// is handed off; this crate never executes it.
    pub fn to_sql(&self, column: &str) -> String {
        match self {
            QueryExpr::Const(true) => "TRUE".to_string(),
            QueryExpr::Const(false) => "FALSE".to_string(),
            QueryExpr::And(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_sql(column)).collect();
                format!("({})", parts.join(" AND "))
            }
            QueryExpr::Or(children) => {
                let parts: Vec<String> = children.iter().map(|c| c.to_sql(column)).collect();
                format!("({})", parts.join(" OR "))
            }
            QueryExpr::Not(inner) => format!("NOT {}", inner.to_sql(column)),
            QueryExpr::HasKey { key, expected } => {
                let test = format!("({column} ? {})", sql_str(key));
                if *expected { test } else { format!("NOT {test}") }
            }
            QueryExpr::HasAllKeys(keys) => {
                let keys: Vec<String> = keys.iter().map(|k| sql_str(k)).collect();
                format!("({column} ?& ARRAY[{}])", keys.join(","))
            }
            QueryExpr::HasAnyKeys(keys) => {
                let keys: Vec<String> = keys.iter().map(|k| sql_str(k)).collect();
                format!("({column} ?| ARRAY[{}])", keys.join(","))
            }
            QueryExpr::TypeCheck { key, cast } => {
                let pattern = match cast {
                    Cast::Integer => r"^-?\d+$",
                    Cast::Numeric => r"^-?\d+(\.\d+)?$",
                    Cast::Text => return "TRUE".to_string(),
                };
                format!("(({column}->{}) ~ '{pattern}')", sql_str(key))
            }
            QueryExpr::Cmp {
                key,
                op,
                value,
                cast,
            } => {
                format!(
                    "(({column}->{}){} {} {})",
                    sql_str(key),
                    cast.suffix(),
                    sql_op(*op),
                    sql_value(value)
                )
            }
        }
    }
}
