//! Transactional log of tree-construction intents.
//!
//! Speculative paths append intents instead of building nodes. The log is its
//! own undo log: rolling back a choice point splices the tail onto a free list
//! in O(1), and nodes are only built when a scope commits.

use std::ops::Range;

use moz_ir::Symbol;

use super::tree::{Children, TreeFactory};
use crate::stack::ensure_sufficient_stack;

#[derive(Clone, Debug)]
enum Kind<'p, T> {
    /// Sentinel at index 0.
    Head,
    /// Opens a node starting at the position.
    New(usize),
    /// Sets the end of the open node.
    Capture(usize),
    Tag(Symbol),
    Replace(&'p [u8]),
    /// Closes the open node and reopens a new one with it as first child.
    LeftFold { pos: usize, label: Symbol },
    /// Opens a nested scope, closed by the matching `Pop`.
    Push,
    Pop(Symbol),
    /// Attaches a built child.
    Link { label: Symbol, child: Option<T> },
}

#[derive(Clone, Debug)]
struct Entry<'p, T> {
    /// Position in the live chain; the head is 0.
    id: usize,
    kind: Kind<'p, T>,
    next: Option<usize>,
}

/// Checkpoint returned by [`AstLog::mark`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AstMark {
    index: usize,
    id: usize,
}

/// Arena-backed singly linked log with a free list.
///
/// Entries live in one `Vec`; links are indices. Live entries carry
/// consecutive ids from the head, so the live length is the id of the last
/// entry and a checkpoint can be checked for staleness by comparing ids.
#[derive(Debug)]
pub struct AstLog<'p, T> {
    entries: Vec<Entry<'p, T>>,
    last: usize,
    free: Option<usize>,
    free_len: usize,
    latest_linked: Option<T>,
    enabled: bool,
}

impl<'p, T: Clone> AstLog<'p, T> {
    pub fn new() -> Self {
        AstLog {
            entries: vec![Entry {
                id: 0,
                kind: Kind::Head,
                next: None,
            }],
            last: 0,
            free: None,
            free_len: 0,
            latest_linked: None,
            enabled: true,
        }
    }

    /// A log that records nothing, for pure recognition.
    pub fn disabled() -> Self {
        AstLog {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries[self.last].id
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of recycled entries waiting for reuse.
    pub fn free_len(&self) -> usize {
        self.free_len
    }

    fn append(&mut self, kind: Kind<'p, T>) {
        if !self.enabled {
            return;
        }
        let id = self.entries[self.last].id + 1;
        let index = match self.free {
            Some(index) => {
                let entry = &mut self.entries[index];
                self.free = entry.next;
                self.free_len -= 1;
                *entry = Entry {
                    id,
                    kind,
                    next: None,
                };
                index
            }
            None => {
                self.entries.push(Entry {
                    id,
                    kind,
                    next: None,
                });
                self.entries.len() - 1
            }
        };
        self.entries[self.last].next = Some(index);
        self.last = index;
    }

    pub fn begin(&mut self, pos: usize) {
        self.append(Kind::New(pos));
    }

    pub fn capture(&mut self, pos: usize) {
        self.append(Kind::Capture(pos));
    }

    pub fn tag(&mut self, tag: Symbol) {
        self.append(Kind::Tag(tag));
    }

    pub fn replace(&mut self, value: &'p [u8]) {
        self.append(Kind::Replace(value));
    }

    pub fn fold(&mut self, pos: usize, label: Symbol) {
        self.append(Kind::LeftFold { pos, label });
    }

    pub fn push(&mut self) {
        self.append(Kind::Push);
    }

    pub fn pop(&mut self, label: Symbol) {
        self.append(Kind::Pop(label));
    }

    /// Attach an already built child and remember it as the latest link.
    pub fn link(&mut self, label: Symbol, child: Option<T>) {
        if !self.enabled {
            return;
        }
        self.latest_linked.clone_from(&child);
        self.append(Kind::Link { label, child });
    }

    /// The child attached by the most recent [`link`](Self::link).
    pub fn latest_linked(&self) -> Option<&T> {
        self.latest_linked.as_ref()
    }

    #[inline]
    pub fn mark(&self) -> AstMark {
        AstMark {
            index: self.last,
            id: self.entries[self.last].id,
        }
    }

    /// Discard every entry after `mark`. O(1).
    pub fn abort(&mut self, mark: AstMark) {
        debug_assert_eq!(
            self.entries[mark.index].id, mark.id,
            "stale AST checkpoint"
        );
        if mark.index == self.last {
            return;
        }
        let tail_len = self.entries[self.last].id - mark.id;
        self.entries[self.last].next = self.free;
        self.free = self.entries[mark.index].next.take();
        self.free_len += tail_len;
        self.last = mark.index;
    }

    /// Build the entries after `mark` into one node, discard them and link
    /// the node under `label`.
    pub fn commit<F>(&mut self, mark: AstMark, label: Symbol, factory: &mut F)
    where
        F: TreeFactory<Tree = T>,
    {
        if !self.enabled {
            return;
        }
        let first = self.entries[mark.index].next;
        let node = first.map(|first| self.construct(Some(first), factory).0);
        self.abort(mark);
        match node {
            Some(node) => self.link(label, Some(node)),
            None => self.latest_linked = None,
        }
    }

    /// Build the final tree of a successful run.
    ///
    /// Construction starts at the first `New` in the log. A run that logged no
    /// node gets a single untagged node spanning `span`.
    pub fn parse_result<F>(&mut self, span: Range<usize>, factory: &mut F) -> T
    where
        F: TreeFactory<Tree = T>,
    {
        let mut cursor = self.entries[0].next;
        while let Some(index) = cursor {
            if matches!(self.entries[index].kind, Kind::New(_)) {
                break;
            }
            cursor = self.entries[index].next;
        }
        let tree = match cursor {
            Some(first) => self.construct(Some(first), factory).0,
            None => factory.node(Symbol::NULL, span, Children::new(), None),
        };
        self.abort(AstMark { index: 0, id: 0 });
        tree
    }

    /// Fold entries from `cursor` into one node.
    ///
    /// Stops at the end of the log or at a `Pop` closing the current scope;
    /// in the latter case the `Pop` index is returned alongside the node.
    fn construct<F>(&self, mut cursor: Option<usize>, factory: &mut F) -> (T, Option<usize>)
    where
        F: TreeFactory<Tree = T>,
    {
        let mut start = cursor.map_or(0, |index| match self.entries[index].kind {
            Kind::New(pos) | Kind::Capture(pos) | Kind::LeftFold { pos, .. } => pos,
            _ => 0,
        });
        let mut end = start;
        let mut tag = Symbol::NULL;
        let mut value: Option<&[u8]> = None;
        let mut children: Children<T> = Children::new();

        while let Some(index) = cursor {
            let entry = &self.entries[index];
            cursor = entry.next;
            match &entry.kind {
                Kind::Head => {}
                Kind::New(pos) => {
                    start = *pos;
                    end = *pos;
                    tag = Symbol::NULL;
                    value = None;
                    children.clear();
                }
                Kind::Capture(pos) => end = *pos,
                Kind::Tag(t) => tag = *t,
                Kind::Replace(v) => value = Some(*v),
                Kind::LeftFold { pos, label } => {
                    let left = factory.node(tag, start..end, std::mem::take(&mut children), value);
                    children.push((*label, left));
                    start = *pos;
                    tag = Symbol::NULL;
                    value = None;
                }
                Kind::Push => {
                    let (child, pop) =
                        ensure_sufficient_stack(|| self.construct(entry.next, factory));
                    let label = match pop.map(|p| &self.entries[p].kind) {
                        Some(Kind::Pop(label)) => *label,
                        _ => Symbol::NULL,
                    };
                    children.push((label, child));
                    cursor = pop.and_then(|p| self.entries[p].next);
                }
                Kind::Pop(_) => {
                    let node = factory.node(tag, start..end, children, value);
                    return (node, Some(index));
                }
                Kind::Link { label, child } => {
                    if let Some(child) = child {
                        children.push((*label, child.clone()));
                    }
                }
            }
        }
        (factory.node(tag, start..end, children, value), None)
    }
}

impl<T: Clone> Default for AstLog<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
