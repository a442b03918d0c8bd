//! The backend contract: one constructor per AST node kind.
//!
//! A backend turns the tree into its own result type bottom-up. Because a
//! fold allocates a fresh result tree and never touches the AST, one parsed
//! filter can be walked by any number of backends, on any number of
//! threads, without re-parsing.

use super::ast::{AstNode, GroupKind, Operator, Value};

pub trait Delegate {
    type Output;

    fn mk_all(&self, children: Vec<Self::Output>) -> Self::Output;
    fn mk_any(&self, children: Vec<Self::Output>) -> Self::Output;
    fn mk_not_all(&self, children: Vec<Self::Output>) -> Self::Output;
    fn mk_not_any(&self, children: Vec<Self::Output>) -> Self::Output;
    fn mk_cmp(&self, key: &str, op: Operator, value: &Value) -> Self::Output;
    fn mk_comment(&self, text: &str, inline: bool) -> Self::Output;
}

impl AstNode {
    /// Fold the tree through a delegate, children first.
    pub fn fold<D: Delegate>(&self, delegate: &D) -> D::Output {
        match self {
            AstNode::Group { kind, children } => {
                let children = children.iter().map(|c| c.fold(delegate)).collect();
                match kind {
                    GroupKind::All => delegate.mk_all(children),
                    GroupKind::Any => delegate.mk_any(children),
                    GroupKind::NotAll => delegate.mk_not_all(children),
                    GroupKind::NotAny => delegate.mk_not_any(children),
                }
            }
            AstNode::Condition { key, op, value } => delegate.mk_cmp(key, *op, value),
            AstNode::Comment { text, inline } => delegate.mk_comment(text, *inline),
        }
    }
}
