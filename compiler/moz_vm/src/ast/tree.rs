//! Materialized parse trees.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::ops::Range;
use std::sync::Arc;

use moz_ir::{Symbol, SymbolPool};
use smallvec::SmallVec;

use crate::Source;

/// Labeled children of a node, in log order.
pub type Children<T> = SmallVec<[(Symbol, T); 4]>;

/// Builds caller-defined tree values when the AST log is committed.
///
/// The machine calls [`node`](TreeFactory::node) only for constructions that
/// survive backtracking, children before parents.
pub trait TreeFactory {
    type Tree: Clone;

    fn node(
        &mut self,
        tag: Symbol,
        span: Range<usize>,
        children: Children<Self::Tree>,
        value: Option<&[u8]>,
    ) -> Self::Tree;
}

/// Default immutable tree, cheap to clone and share.
#[derive(Clone, PartialEq, Eq)]
pub struct CommonTree(Arc<Node>);

#[derive(PartialEq, Eq)]
struct Node {
    tag: Symbol,
    span: Range<usize>,
    children: Children<CommonTree>,
    value: Option<Box<[u8]>>,
}

impl CommonTree {
    pub fn tag(&self) -> Symbol {
        self.0.tag
    }

    /// Byte range of the input this node covers.
    pub fn span(&self) -> Range<usize> {
        self.0.span.clone()
    }

    pub fn children(&self) -> &[(Symbol, CommonTree)] {
        &self.0.children
    }

    /// First child linked under `label`.
    pub fn child(&self, label: Symbol) -> Option<&CommonTree> {
        self.0
            .children
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| c)
    }

    pub fn is_leaf(&self) -> bool {
        self.0.children.is_empty()
    }

    /// Replacement value set by the grammar, if any.
    pub fn value(&self) -> Option<&[u8]> {
        self.0.value.as_deref()
    }

    /// The replacement value, or the covered input text.
    pub fn text<'s, S: Source + ?Sized>(&'s self, source: &'s S) -> Cow<'s, str> {
        match &self.0.value {
            Some(value) => String::from_utf8_lossy(value),
            None => source.sub_string(self.0.span.start, self.0.span.end),
        }
    }

    /// Compact s-expression: `#Add[#Int'1' $right=#Int'2']`.
    pub fn sexpr<S: Source + ?Sized>(&self, symbols: &SymbolPool, source: &S) -> String {
        let mut out = String::new();
        self.write_sexpr(&mut out, symbols, source);
        out
    }

    fn write_sexpr<S: Source + ?Sized>(&self, out: &mut String, symbols: &SymbolPool, source: &S) {
        out.push('#');
        out.push_str(symbols.name(self.tag()));
        if self.is_leaf() {
            let _ = write!(out, "'{}'", self.text(source));
            return;
        }
        out.push('[');
        for (i, (label, child)) in self.children().iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            if !label.is_null() {
                let _ = write!(out, "${}=", symbols.name(*label));
            }
            child.write_sexpr(out, symbols, source);
        }
        out.push(']');
    }
}

impl std::fmt::Debug for CommonTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommonTree")
            .field("tag", &self.0.tag)
            .field("span", &self.0.span)
            .field("children", &self.0.children.len())
            .finish()
    }
}

/// Factory for [`CommonTree`].
#[derive(Copy, Clone, Debug, Default)]
pub struct CommonTreeFactory;

impl TreeFactory for CommonTreeFactory {
    type Tree = CommonTree;

    fn node(
        &mut self,
        tag: Symbol,
        span: Range<usize>,
        children: Children<CommonTree>,
        value: Option<&[u8]>,
    ) -> CommonTree {
        CommonTree(Arc::new(Node {
            tag,
            span,
            children,
            value: value.map(Box::from),
        }))
    }
}
