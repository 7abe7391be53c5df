//! Scoped symbol table for context-sensitive matching.
//!
//! Every table name shares one stack of bindings. A checkpoint is the stack
//! size, so saving and restoring a scope is O(1) regardless of how many names
//! were bound inside it.

use moz_ir::Symbol;

#[derive(Clone, Debug)]
struct Entry {
    /// Value of the state counter right after this entry was pushed.
    state: u32,
    table: Symbol,
    /// `None` marks a mask hiding outer bindings of `table`.
    value: Option<Box<[u8]>>,
}

/// Checkpoint returned by [`SymbolTable::save`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SymbolMark(usize);

/// Stack of name bindings with a state fingerprint.
///
/// `state()` changes whenever the set of visible bindings may have changed,
/// and returns to its earlier value when a checkpoint is restored. Memoized
/// rules that depend on bindings key their entries by it.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<Entry>,
    state: u32,
    generation: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn save(&self) -> SymbolMark {
        SymbolMark(self.entries.len())
    }

    /// Drop every binding made after `mark` and recover its state.
    pub fn restore(&mut self, mark: SymbolMark) {
        if mark.0 < self.entries.len() {
            self.entries.truncate(mark.0);
            self.state = self.entries.last().map_or(0, |e| e.state);
        }
    }

    /// Bind `table` to `value`, shadowing earlier bindings.
    pub fn define(&mut self, table: Symbol, value: &[u8]) {
        let unchanged = self.lookup(table) == Some(value);
        self.push(table, Some(Box::from(value)), unchanged);
    }

    /// Hide every outer binding of `table` until the enclosing scope closes.
    pub fn mask(&mut self, table: Symbol) {
        let unchanged = self.lookup(table).is_none();
        self.push(table, None, unchanged);
    }

    fn push(&mut self, table: Symbol, value: Option<Box<[u8]>>, unchanged: bool) {
        if !unchanged {
            self.generation += 1;
            self.state = self.generation;
        }
        self.entries.push(Entry {
            state: self.state,
            table,
            value,
        });
    }

    /// Most recent binding of `table`, or `None` if absent or masked.
    pub fn lookup(&self, table: Symbol) -> Option<&[u8]> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.table == table)
            .and_then(|e| e.value.as_deref())
    }

    pub fn exists(&self, table: Symbol) -> bool {
        self.lookup(table).is_some()
    }

    /// Whether the most recent binding of `table` equals `bytes`.
    pub fn matches(&self, table: Symbol, bytes: &[u8]) -> bool {
        self.lookup(table) == Some(bytes)
    }

    /// Whether any binding of `table` visible from here equals `bytes`.
    pub fn contains(&self, table: Symbol, bytes: &[u8]) -> bool {
        for entry in self.entries.iter().rev().filter(|e| e.table == table) {
            match entry.value.as_deref() {
                None => return false,
                Some(value) if value == bytes => return true,
                Some(_) => {}
            }
        }
        false
    }

    #[inline]
    pub fn state(&self) -> u32 {
        self.state
    }

    /// The state as it was when `mark` was taken.
    pub fn state_at(&self, mark: SymbolMark) -> u32 {
        match mark.0.checked_sub(1) {
            Some(last) if last < self.entries.len() => self.entries[last].state,
            _ => 0,
        }
    }

    /// Number of entries, masks included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests;
