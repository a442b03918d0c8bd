//! Structural parser for the filter language.
//!
//! Grammar (in rough EBNF):
//!
//! program   = expr*                      (implicitly an All group)
//! expr      = comment | group | condition
//! group     = ("{" | "[" | "!{" | "![") expr* ("}" | "]")
//! condition = key op value
//! key       = BARE | STRING
//! op        = "=" | "!=" | "<" | "<=" | ">" | ">=" | "?=" | "in" | "!in"
//! value     = NUMBER | BOOLEAN | TIMESTAMP | STRING | array
//! array     = "(" value (sep value)* ")"
//! sep       = "," | NEWLINE+
//!
//! Expressions are separated by commas or newlines. Group closers never
//! need a preceding separator; comments neither need nor provide one.

use std::collections::BTreeSet;

use super::ast::{AstNode, GroupKind, Operator, Value};
use super::error::{Error, Result};
use super::lexer::{Spanned, Token, tokenize};

/// Group and array nesting beyond this depth is rejected instead of risking
/// a stack overflow in the recursive backends.
const MAX_DEPTH: usize = 64;

/// A successfully parsed filter: the tree plus the set of referenced keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub root: AstNode,
    pub keys: BTreeSet<String>,
}

/// Parse a filter source string.
pub fn parse(src: &str) -> Result<Parsed> {
    let tokens = tokenize(src)?;
    Parser {
        tokens,
        pos: 0,
        keys: BTreeSet::new(),
    }
    .parse_program()
}

struct Frame {
    kind: GroupKind,
    children: Vec<AstNode>,
    opened_at: usize,
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    keys: BTreeSet<String>,
}

impl Parser {
    fn advance(&mut self) -> Spanned {
        let spanned = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or_else(|| Spanned {
                offset: 0,
                tok: Token::Eof,
            });
        self.pos += 1;
        spanned
    }

    fn parse_program(mut self) -> Result<Parsed> {
        // The whole program is an implicit `{ ... }`, so a bare list of
        // conditions is an All group and a single explicit group becomes
        // the root's only child.
        let mut frames = vec![Frame {
            kind: GroupKind::All,
            children: Vec::new(),
            opened_at: 0,
        }];
        // Cleared after each condition or group close, re-armed by a
        // separator. Two commas in a row is an error.
        let mut armed = true;

        loop {
            let Spanned { offset, tok } = self.advance();
            match tok {
                Token::Newline => armed = true,
                Token::Comma => {
                    if armed {
                        return Err(Error::syntax(offset, "unexpected `,`"));
                    }
                    armed = true;
                }
                Token::GroupOpen(kind) => {
                    if !armed {
                        return Err(Error::syntax(
                            offset,
                            format!("missing separator before `{}`", kind.opener()),
                        ));
                    }
                    if frames.len() >= MAX_DEPTH {
                        return Err(Error::syntax(offset, "groups nested too deeply"));
                    }
                    frames.push(Frame {
                        kind,
                        children: Vec::new(),
                        opened_at: offset,
                    });
                    armed = true;
                }
                Token::GroupClose(closer) => {
                    if frames.len() == 1 {
                        return Err(Error::syntax(offset, format!("unmatched `{closer}`")));
                    }
                    let frame = match frames.pop() {
                        Some(frame) => frame,
                        None => return Err(Error::syntax(offset, format!("unmatched `{closer}`"))),
                    };
                    if closer != frame.kind.closer() {
                        return Err(Error::syntax(
                            offset,
                            format!(
                                "mismatched group: `{}` opened at byte {} closes with `{}`, found `{closer}`",
                                frame.kind.opener(),
                                frame.opened_at,
                                frame.kind.closer(),
                            ),
                        ));
                    }
                    push_child(
                        &mut frames,
                        AstNode::Group {
                            kind: frame.kind,
                            children: frame.children,
                        },
                    );
                    armed = false;
                }
                Token::Key(key) | Token::Str(key) => {
                    if !armed {
                        return Err(Error::syntax(
                            offset,
                            "missing separator between expressions",
                        ));
                    }
                    let condition = self.parse_condition(key)?;
                    push_child(&mut frames, condition);
                    armed = false;
                }
                Token::Comment { text, inline } => {
                    // An inline marker only makes sense directly after a
                    // condition; anywhere else the comment stands alone.
                    let inline = inline
                        && matches!(
                            frames.last().and_then(|f| f.children.last()),
                            Some(AstNode::Condition { .. })
                        );
                    push_child(&mut frames, AstNode::Comment { text, inline });
                }
                Token::Eof => break,
                Token::Op(op) => {
                    return Err(Error::syntax(offset, format!("unexpected operator `{op}`")));
                }
                Token::ArrayClose => return Err(Error::syntax(offset, "unexpected `)`")),
                Token::Num(_) | Token::Bool(_) | Token::Timestamp(_) | Token::ArrayOpen => {
                    return Err(Error::syntax(offset, "expected a key"));
                }
            }
        }

        if frames.len() > 1 {
            let innermost = &frames[frames.len() - 1];
            return Err(Error::syntax(
                innermost.opened_at,
                format!("unterminated `{}` group", innermost.kind.opener()),
            ));
        }

        let root_children = match frames.pop() {
            Some(frame) => frame.children,
            None => Vec::new(),
        };
        Ok(Parsed {
            root: AstNode::Group {
                kind: GroupKind::All,
                children: root_children,
            },
            keys: self.keys,
        })
    }

    /// The key token was just consumed; parse `op value` and validate the
    /// operator/operand pairing.
    fn parse_condition(&mut self, key: String) -> Result<AstNode> {
        let Spanned { offset, tok } = self.advance();
        let op = match tok {
            Token::Op(op) => op,
            _ => {
                return Err(Error::syntax(
                    offset,
                    format!("expected an operator after key `{key}`"),
                ));
            }
        };

        // the operand may start on its own line, e.g. `in` followed by a
        // multiline array
        let Spanned {
            offset: val_offset,
            tok,
        } = loop {
            let spanned = self.advance();
            if !matches!(spanned.tok, Token::Newline) {
                break spanned;
            }
        };
        let value = match tok {
            Token::Str(s) => Value::Str(s),
            Token::Num(n) => Value::Num(n),
            Token::Bool(b) => Value::Bool(b),
            Token::Timestamp(t) => Value::Timestamp(t),
            Token::ArrayOpen => self.parse_array(val_offset)?,
            Token::Key(word) => {
                return Err(Error::syntax(
                    val_offset,
                    format!("expected a value, found bare word `{word}` (quote string values)"),
                ));
            }
            _ => return Err(Error::syntax(val_offset, "expected a value")),
        };

        match op {
            Operator::Exists => {
                if !matches!(value, Value::Bool(_)) {
                    return Err(Error::validation(
                        val_offset,
                        format!("`?=` requires a boolean operand, found {}", value.kind()),
                    ));
                }
            }
            Operator::In | Operator::NotIn => {
                if !matches!(value, Value::Array(_)) {
                    return Err(Error::validation(
                        val_offset,
                        format!("`{op}` requires an array operand, found {}", value.kind()),
                    ));
                }
            }
            _ => {
                if matches!(value, Value::Array(_)) {
                    return Err(Error::validation(
                        val_offset,
                        format!("array operand requires `in` or `!in`, found `{op}`"),
                    ));
                }
            }
        }

        self.keys.insert(key.clone());
        Ok(AstNode::Condition { key, op, value })
    }

    fn parse_array(&mut self, open_offset: usize) -> Result<Value> {
        let mut elems: Vec<Value> = Vec::new();
        let mut armed = true;

        loop {
            let Spanned { offset, tok } = self.advance();
            let elem = match tok {
                Token::Newline => {
                    armed = true;
                    continue;
                }
                Token::Comma => {
                    if armed {
                        return Err(Error::syntax(offset, "unexpected `,` in array"));
                    }
                    armed = true;
                    continue;
                }
                Token::Comment { .. } => continue,
                Token::ArrayClose => break,
                Token::Str(s) => Value::Str(s),
                Token::Num(n) => Value::Num(n),
                Token::Bool(b) => Value::Bool(b),
                Token::Timestamp(t) => Value::Timestamp(t),
                Token::ArrayOpen => {
                    return Err(Error::validation(offset, "nested arrays are not supported"));
                }
                Token::Eof => {
                    return Err(Error::syntax(open_offset, "unterminated array"));
                }
                Token::Key(word) => {
                    return Err(Error::syntax(
                        offset,
                        format!("expected a value in array, found bare word `{word}`"),
                    ));
                }
                _ => return Err(Error::syntax(offset, "expected a value in array")),
            };

            if !armed {
                return Err(Error::syntax(offset, "missing separator in array"));
            }
            if let Some(first) = elems.first()
                && first.kind() != elem.kind()
            {
                return Err(Error::validation(
                    offset,
                    format!(
                        "mixed array: expected {}, found {}",
                        first.kind(),
                        elem.kind()
                    ),
                ));
            }
            elems.push(elem);
            armed = false;
        }

        if elems.is_empty() {
            return Err(Error::validation(open_offset, "empty array"));
        }
        Ok(Value::Array(elems))
    }
}

fn push_child(frames: &mut [Frame], node: AstNode) {
    if let Some(frame) = frames.last_mut() {
        frame.children.push(node);
    }
}
