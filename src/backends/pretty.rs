//! Canonical printer: dense and pretty renderings of a parsed filter.
//!
//! Output is canonical: keys are double-quoted, group children and array
//! elements are sorted by a stable key, and redundant group wrappers are
//! collapsed. Printing an already-printed filter reproduces it byte for
//! byte, and structurally equal filters print identically regardless of
//! how their source was ordered.

use std::cmp::Ordering;

use crate::dsl::ast::{GroupKind, Operator, Value, fmt_number};
use crate::dsl::delegate::Delegate;

/// Fold output: a printable node.
#[derive(Debug, Clone, PartialEq)]
pub enum Doc {
    Cond {
        key: String,
        op: Operator,
        value: Value,
        /// Trailing comment kept on the condition's line in pretty mode.
        comment: Option<String>,
    },
    Comment {
        text: String,
        inline: bool,
    },
    Group {
        kind: GroupKind,
        children: Vec<Doc>,
    },
}

/// Builds the printable tree. Rendering picks dense or pretty afterwards.
pub struct PrettyDelegate;

/// Attach inline comments to the condition they trail; anything else
/// stands alone as a block comment.
fn group(kind: GroupKind, children: Vec<Doc>) -> Doc {
    let mut merged: Vec<Doc> = Vec::new();
    for child in children {
        match child {
            Doc::Comment { text, inline: true } => {
                if let Some(Doc::Cond {
                    comment: slot @ None,
                    ..
                }) = merged.last_mut()
                {
                    *slot = Some(text);
                } else {
                    merged.push(Doc::Comment {
                        text,
                        inline: false,
                    });
                }
            }
            other => merged.push(other),
        }
    }
    Doc::Group {
        kind,
        children: merged,
    }
}

impl Delegate for PrettyDelegate {
    type Output = Doc;

    fn mk_all(&self, children: Vec<Doc>) -> Doc {
        group(GroupKind::All, children)
    }

    fn mk_any(&self, children: Vec<Doc>) -> Doc {
        group(GroupKind::Any, children)
    }

    fn mk_not_all(&self, children: Vec<Doc>) -> Doc {
        group(GroupKind::NotAll, children)
    }

    fn mk_not_any(&self, children: Vec<Doc>) -> Doc {
        group(GroupKind::NotAny, children)
    }

    fn mk_cmp(&self, key: &str, op: Operator, value: &Value) -> Doc {
        Doc::Cond {
            key: key.to_string(),
            op,
            value: value.clone(),
            comment: None,
        }
    }

    fn mk_comment(&self, text: &str, inline: bool) -> Doc {
        Doc::Comment {
            text: text.to_string(),
            inline,
        }
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn comment_line(text: &str) -> String {
    if text.is_empty() {
        "#".to_string()
    } else {
        format!("# {text}")
    }
}

fn fmt_timestamp(secs: i64) -> String {
    let dt = time::OffsetDateTime::from_unix_timestamp(secs)
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    if secs.rem_euclid(86_400) == 0 {
        format!(
            "timestamp({:04}-{:02}-{:02})",
            dt.year(),
            dt.month() as u8,
            dt.day()
        )
    } else {
        format!(
            "timestamp({:04}-{:02}-{:02} {:02}:{:02})",
            dt.year(),
            dt.month() as u8,
            dt.day(),
            dt.hour(),
            dt.minute()
        )
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Str(s) => quote(s),
        Value::Num(n) => fmt_number(*n),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Timestamp(t) => fmt_timestamp(*t),
        // arrays are rendered by the condition writer
        Value::Array(_) => String::new(),
    }
}

/// Canonical order inside an array: `true` before `false`, then by value.
fn elem_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => y.cmp(x),
        (Value::Num(x), Value::Num(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Canonical order inside a group: conditions and block comments by their
/// rendered text, then OR-family groups, then AND-family groups.
fn sort_key(child: &Doc) -> (u8, String) {
    match child {
        Doc::Cond { .. } => (0, child.dense_text()),
        Doc::Comment { text, .. } => (0, comment_line(text)),
        Doc::Group {
            kind: GroupKind::Any | GroupKind::NotAny,
            ..
        } => (1, child.dense_text()),
        Doc::Group {
            kind: GroupKind::All | GroupKind::NotAll,
            ..
        } => (2, child.dense_text()),
    }
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

impl Doc {
    /// Render canonically: dense is a single comma-separated line without
    /// comments, pretty is one expression per line with two-space indents.
    pub fn render(&self, dense: bool) -> String {
        let mut out = String::new();
        if dense {
            // comments are gone from dense output, so drop them before
            // deciding which wrappers are redundant
            let stripped = self.strip_comments();
            stripped.collapse().write(&mut out, true, 0);
        } else {
            self.collapse().write(&mut out, false, 0);
        }
        out
    }

    fn strip_comments(&self) -> Doc {
        match self {
            Doc::Group { kind, children } => Doc::Group {
                kind: *kind,
                children: children
                    .iter()
                    .filter(|c| !matches!(c, Doc::Comment { .. }))
                    .map(|c| c.strip_comments())
                    .collect(),
            },
            Doc::Cond {
                key, op, value, ..
            } => Doc::Cond {
                key: key.clone(),
                op: *op,
                value: value.clone(),
                comment: None,
            },
            comment => comment.clone(),
        }
    }

    /// A positive group whose only child is a group stands for that child.
    /// Negated groups keep their wrapper, which carries the negation.
    fn collapse(&self) -> &Doc {
        let mut doc = self;
        while let Doc::Group {
            kind: GroupKind::All | GroupKind::Any,
            children,
        } = doc
        {
            match children.as_slice() {
                [only @ Doc::Group { .. }] => doc = only,
                _ => break,
            }
        }
        doc
    }

    fn dense_text(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, true, 0);
        out
    }

    fn write(&self, out: &mut String, dense: bool, level: usize) {
        match self {
            Doc::Group { kind, children } => {
                let mut kids: Vec<&Doc> = children
                    .iter()
                    .filter(|c| !(dense && matches!(c, Doc::Comment { .. })))
                    .map(|c| c.collapse())
                    .collect();
                kids.sort_by_cached_key(|c| sort_key(c));

                out.push_str(kind.opener());
                if dense {
                    for (i, child) in kids.iter().enumerate() {
                        if i > 0 {
                            out.push(',');
                        }
                        child.write(out, true, 0);
                    }
                } else {
                    out.push('\n');
                    for child in kids {
                        push_indent(out, level + 1);
                        child.write(out, false, level + 1);
                        out.push('\n');
                    }
                    push_indent(out, level);
                }
                out.push(kind.closer());
            }
            Doc::Cond {
                key,
                op,
                value,
                comment,
            } => {
                out.push_str(&quote(key));
                if !dense {
                    out.push(' ');
                }
                out.push_str(op.token());
                if !dense {
                    out.push(' ');
                }
                match value {
                    Value::Array(elems) => {
                        let mut elems: Vec<&Value> = elems.iter().collect();
                        elems.sort_by(|a, b| elem_order(a, b));
                        if dense {
                            out.push('(');
                            for (i, elem) in elems.iter().enumerate() {
                                if i > 0 {
                                    out.push(',');
                                }
                                out.push_str(&scalar_text(elem));
                            }
                            out.push(')');
                        } else {
                            out.push_str("(\n");
                            for elem in elems {
                                push_indent(out, level + 1);
                                out.push_str(&scalar_text(elem));
                                out.push('\n');
                            }
                            push_indent(out, level);
                            out.push(')');
                        }
                    }
                    scalar => out.push_str(&scalar_text(scalar)),
                }
                if !dense && let Some(text) = comment {
                    out.push(' ');
                    out.push_str(&comment_line(text));
                }
            }
            Doc::Comment { text, .. } => {
                if !dense {
                    out.push_str(&comment_line(text));
                }
            }
        }
    }
}
