//! Interned handles for tags, labels, rule names and symbol-table names.
//!
//! All four kinds of name share one pool. A handle is a `u32` index, so
//! equality is an integer compare and the handle is `Copy`.

use rustc_hash::FxHashMap;
use std::fmt;

use crate::PoolError;

/// Interned name handle.
///
/// `Symbol::NULL` is the empty name and stands for "no tag" or "no label".
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
#[repr(transparent)]
pub struct Symbol(u32);

impl Symbol {
    /// The empty name, pre-interned at index 0.
    pub const NULL: Symbol = Symbol(0);

    /// Get the index into the pool.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for the empty name.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Symbol::NULL")
        } else {
            write!(f, "Symbol({})", self.0)
        }
    }
}

/// Deduplicating pool of names.
///
/// Built while the program is emitted and frozen inside the `Program`
/// afterwards, so lookups during a parse never mutate it.
#[derive(Clone, Debug)]
pub struct SymbolPool {
    map: FxHashMap<Box<str>, Symbol>,
    names: Vec<Box<str>>,
}

impl SymbolPool {
    /// Create a pool containing only the empty name.
    pub fn new() -> Self {
        let mut map = FxHashMap::default();
        map.insert(Box::from(""), Symbol::NULL);
        SymbolPool {
            map,
            names: vec![Box::from("")],
        }
    }

    /// Intern `name`, or report that the pool has no handle left for it.
    pub fn try_intern(&mut self, name: &str) -> Result<Symbol, PoolError> {
        if let Some(&sym) = self.map.get(name) {
            return Ok(sym);
        }
        let sym = Symbol(next_index(self.names.len())?);
        self.names.push(Box::from(name));
        self.map.insert(Box::from(name), sym);
        Ok(sym)
    }

    /// Intern `name`, returning the existing handle when already present.
    ///
    /// # Panics
    /// Panics if the pool exceeds `u32::MAX` names.
    /// Use `try_intern` for fallible interning.
    #[inline]
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.try_intern(name).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.map.get(name).copied()
    }

    /// Resolve a handle back to its name.
    ///
    /// Handles from another pool resolve to the empty name.
    pub fn name(&self, sym: Symbol) -> &str {
        self.names.get(sym.index()).map_or("", |s| s)
    }

    /// Number of interned names, including the empty name.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always `false`: the empty name is pre-interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn next_index(len: usize) -> Result<u32, PoolError> {
    u32::try_from(len).map_err(|_| PoolError {
        pool: "symbol pool",
        count: len,
        max: u32::MAX,
    })
}

impl Default for SymbolPool {
    fn default() -> Self {
        Self::new()
    }
}
