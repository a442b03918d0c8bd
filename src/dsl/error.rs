//! Error types for filter compilation.
//!
//! Compilation is the only fallible step. Evaluating a compiled filter never
//! errors; per-record failures resolve to documented boolean defaults.

use thiserror::Error;

/// Why a filter source failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed text: bad token, unbalanced or mismatched groups, bad
    /// separator, unterminated literal.
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Well-formed text with an invalid construct, e.g. `?=` applied to a
    /// non-boolean operand or a mixed-type array.
    #[error("invalid filter at byte {offset}: {message}")]
    Validation { offset: usize, message: String },
}

impl Error {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn validation(offset: usize, message: impl Into<String>) -> Self {
        Error::Validation {
            offset,
            message: message.into(),
        }
    }

    /// Byte offset into the source where the problem was detected.
    pub fn offset(&self) -> usize {
        match self {
            Error::Syntax { offset, .. } | Error::Validation { offset, .. } => *offset,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
