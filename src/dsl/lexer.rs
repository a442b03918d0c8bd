//! Lexer/tokenizer for the filter language.

use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::take_while;

use super::ast::{GroupKind, Operator};
use super::error::{Error, Result};

/// Token types produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    GroupOpen(GroupKind),
    /// `}` or `]`; the parser checks it against the innermost open group.
    GroupClose(char),
    Key(String),
    Op(Operator),
    Str(String),
    Num(f64),
    Bool(bool),
    Timestamp(i64),
    ArrayOpen,
    ArrayClose,
    Comma,
    /// One token per run of newlines; a separator for the parser.
    Newline,
    Comment {
        text: String,
        inline: bool,
    },
    Eof,
}

/// A token plus the byte offset where it starts in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub offset: usize,
    pub tok: Token,
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = std::result::Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

/// Insignificant whitespace. U+FEFF shows up in filters pasted from rich
/// editors, so it is tolerated alongside spaces, tabs and carriage returns.
fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\u{feff}')
}

/// Characters allowed in a bare (unquoted) key.
fn is_bare(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$' | '.')
}

fn skip_space<'a>(input: &mut &'a str) {
    let _: PResult<&'a str> = take_while(0.., is_space).parse_next(input);
}

fn lex_bare<'a>(input: &mut &'a str) -> PResult<&'a str> {
    take_while(1.., is_bare).parse_next(input)
}

/// Symbol operators, longest first so that `?=`, `<=` and `>=` win over
/// their one-character prefixes.
fn lex_symbol_op(input: &mut &str) -> PResult<Operator> {
    alt((
        "?=".value(Operator::Exists),
        "<=".value(Operator::Le),
        ">=".value(Operator::Ge),
        "=".value(Operator::Eq),
        "<".value(Operator::Lt),
        ">".value(Operator::Gt),
    ))
    .parse_next(input)
}

fn lex_comment(input: &mut &str) -> PResult<String> {
    let _ = '#'.parse_next(input)?;
    let body = take_while(0.., |c: char| c != '\n').parse_next(input)?;
    Ok(body.trim().to_string())
}

/// A quoted key or string value. The backslash escapes the quote character
/// and itself; any other escaped character is kept verbatim.
fn lex_quoted(offset: usize, input: &mut &str) -> Result<String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(Error::syntax(offset, "expected quote")),
    };

    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            if c != quote && c != '\\' {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            *input = &input[i + c.len_utf8()..];
            return Ok(out);
        } else if c == '\n' {
            break;
        } else {
            out.push(c);
        }
    }
    Err(Error::syntax(offset, "unterminated string literal"))
}

/// Does a bare word have the shape of a signed integer or decimal literal?
/// Keys may also contain digits and dashes (`report-9-17`), so only the
/// exact numeric shape counts.
fn numeric_shape(word: &str) -> bool {
    let body = word.strip_prefix('-').unwrap_or(word);
    let mut parts = body.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    let frac = parts.next();
    !int.is_empty()
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse the body of a `timestamp(...)` literal: `YYYY-MM-DD` with an
/// optional ` HH:MM`, interpreted as UTC. Range errors (month 13, minute
/// 99) reject the literal.
fn parse_timestamp(body: &str) -> Option<i64> {
    let body = body.trim();
    let (date, clock) = match body.split_once(' ') {
        Some((d, t)) => (d, Some(t.trim())),
        None => (body, None),
    };

    let mut fields = date.splitn(3, '-');
    let year: i32 = fields.next()?.parse().ok()?;
    let month: u8 = fields.next()?.parse().ok()?;
    let day: u8 = fields.next()?.parse().ok()?;
    let date = time::Date::from_calendar_date(year, time::Month::try_from(month).ok()?, day).ok()?;

    let clock = match clock {
        Some(t) => {
            let (h, m) = t.split_once(':')?;
            time::Time::from_hms(h.parse().ok()?, m.parse().ok()?, 0).ok()?
        }
        None => time::Time::MIDNIGHT,
    };

    Some(
        time::PrimitiveDateTime::new(date, clock)
            .assume_utc()
            .unix_timestamp(),
    )
}

fn lex_timestamp(offset: usize, input: &mut &str) -> Result<i64> {
    // input starts at the opening parenthesis
    let end = match input.find(')') {
        Some(end) if !input[..end].contains('\n') => end,
        _ => return Err(Error::syntax(offset, "unterminated timestamp literal")),
    };
    let body = &input[1..end];
    let secs = parse_timestamp(body)
        .ok_or_else(|| Error::syntax(offset, format!("malformed timestamp `{}`", body.trim())))?;
    *input = &input[end + 1..];
    Ok(secs)
}

/// Tokenize the entire source string.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut rest = src;
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut line_has_expr = false;

    loop {
        skip_space(&mut rest);
        let offset = src.len() - rest.len();
        let Some(c) = rest.chars().next() else { break };

        let tok = match c {
            '\n' => {
                rest = &rest[1..];
                line_has_expr = false;
                if !matches!(tokens.last().map(|t| &t.tok), Some(Token::Newline)) {
                    tokens.push(Spanned {
                        offset,
                        tok: Token::Newline,
                    });
                }
                continue;
            }
            '{' => {
                rest = &rest[1..];
                Token::GroupOpen(GroupKind::All)
            }
            '[' => {
                rest = &rest[1..];
                Token::GroupOpen(GroupKind::Any)
            }
            '}' | ']' => {
                rest = &rest[1..];
                Token::GroupClose(c)
            }
            '(' => {
                rest = &rest[1..];
                Token::ArrayOpen
            }
            ')' => {
                rest = &rest[1..];
                Token::ArrayClose
            }
            ',' => {
                rest = &rest[1..];
                Token::Comma
            }
            '#' => match lex_comment(&mut rest) {
                Ok(text) => Token::Comment {
                    text,
                    inline: line_has_expr,
                },
                Err(_) => return Err(Error::syntax(offset, "malformed comment")),
            },
            '!' => {
                if rest.starts_with("!{") {
                    rest = &rest[2..];
                    Token::GroupOpen(GroupKind::NotAll)
                } else if rest.starts_with("![") {
                    rest = &rest[2..];
                    Token::GroupOpen(GroupKind::NotAny)
                } else if rest.starts_with("!in")
                    && rest[3..].chars().next().is_none_or(|c| !is_bare(c))
                {
                    rest = &rest[3..];
                    Token::Op(Operator::NotIn)
                } else if rest.starts_with("!=") {
                    rest = &rest[2..];
                    Token::Op(Operator::Ne)
                } else {
                    return Err(Error::syntax(offset, "unexpected `!`"));
                }
            }
            '?' | '<' | '>' | '=' => match lex_symbol_op(&mut rest) {
                Ok(op) => Token::Op(op),
                Err(_) => {
                    return Err(Error::syntax(offset, format!("unrecognized operator `{c}`")));
                }
            },
            '"' | '\'' => Token::Str(lex_quoted(offset, &mut rest)?),
            c if is_bare(c) => {
                let word = match lex_bare(&mut rest) {
                    Ok(w) => w,
                    Err(_) => return Err(Error::syntax(offset, "malformed token")),
                };
                if word.eq_ignore_ascii_case("true") {
                    Token::Bool(true)
                } else if word.eq_ignore_ascii_case("false") {
                    Token::Bool(false)
                } else if word == "in" {
                    Token::Op(Operator::In)
                } else if word == "timestamp" && rest.starts_with('(') {
                    Token::Timestamp(lex_timestamp(offset, &mut rest)?)
                } else if numeric_shape(word) {
                    match word.parse::<f64>() {
                        Ok(n) => Token::Num(n),
                        Err(_) => {
                            return Err(Error::syntax(offset, format!("malformed number `{word}`")));
                        }
                    }
                } else {
                    Token::Key(word.to_string())
                }
            }
            other => {
                return Err(Error::syntax(
                    offset,
                    format!("unrecognized character `{other}`"),
                ));
            }
        };

        line_has_expr = true;
        tokens.push(Spanned { offset, tok });
    }

    tokens.push(Spanned {
        offset: src.len(),
        tok: Token::Eof,
    });
    Ok(tokens)
}
