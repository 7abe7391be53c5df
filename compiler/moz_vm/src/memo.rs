//! Packrat memo table.
//!
//! Caches the outcome of a memoized rule at an input position so the rule is
//! evaluated at most once there. Every strategy is sound: a lookup that cannot
//! be answered exactly is a miss, and a miss only costs re-evaluation.

use moz_ir::MemoId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::options::{MemoStrategy, ParserOptions};

/// Cached outcome of one rule at one position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoEntry<T> {
    pub failed: bool,
    /// Bytes consumed by a successful match.
    pub consumed: usize,
    /// Node linked by a tree-mutating rule.
    pub result: Option<T>,
    /// Symbol-table state at record time; 0 for stateless rules.
    pub state: u32,
}

#[derive(Clone, Debug)]
struct Slot<T> {
    pos: usize,
    memo: MemoId,
    entry: MemoEntry<T>,
}

#[derive(Debug)]
enum Store<T> {
    Disabled,
    /// Fixed array; a write evicts whatever shared its slot.
    Elastic { slots: Vec<Option<Slot<T>>>, shift: u32 },
    /// Every recorded entry, newest last per position.
    Exact(FxHashMap<usize, SmallVec<[(MemoId, MemoEntry<T>); 2]>>),
}

/// Memo storage plus hit counters for one run.
#[derive(Debug)]
pub struct MemoTable<T> {
    store: Store<T>,
    stored: u64,
    used: u64,
    invalidated: u64,
}

impl<T: Clone> MemoTable<T> {
    /// Size a table for `points` memo points.
    ///
    /// No memo points or a zero window disables memoization. Elastic tables
    /// get `window * points + 1` slots, at most [`ParserOptions::MAX_SLOTS`].
    pub fn new(strategy: MemoStrategy, window: usize, points: usize) -> Self {
        if points == 0 || window == 0 {
            return Self::with_store(Store::Disabled);
        }
        match strategy {
            MemoStrategy::Disabled => Self::with_store(Store::Disabled),
            MemoStrategy::Elastic => {
                Self::elastic(window.saturating_mul(points).saturating_add(1), points)
            }
            MemoStrategy::Exact => Self::with_store(Store::Exact(FxHashMap::default())),
        }
    }

    /// Table for one run under `options`.
    ///
    /// An explicit elastic slot count replaces the window-derived one; zero
    /// slots disables memoization.
    pub fn for_options(options: &ParserOptions, points: usize) -> Self {
        match (options.memo, options.slots) {
            (MemoStrategy::Elastic, Some(0)) => Self::with_store(Store::Disabled),
            (MemoStrategy::Elastic, Some(slots)) if points > 0 => Self::elastic(slots, points),
            _ => Self::new(options.memo, options.window, points),
        }
    }

    /// Elastic table with an explicit slot count, clamped to
    /// `1..=ParserOptions::MAX_SLOTS`.
    pub fn elastic(capacity: usize, points: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity.clamp(1, ParserOptions::MAX_SLOTS), || None);
        Self::with_store(Store::Elastic {
            slots,
            // Bits needed to hold any memo id.
            shift: usize::BITS - points.leading_zeros(),
        })
    }

    fn with_store(store: Store<T>) -> Self {
        MemoTable {
            store,
            stored: 0,
            used: 0,
            invalidated: 0,
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.store, Store::Disabled)
    }

    /// Fixed slot count; `None` for an unbounded exact table.
    pub fn slots(&self) -> Option<usize> {
        match &self.store {
            Store::Disabled => Some(0),
            Store::Elastic { slots, .. } => Some(slots.len()),
            Store::Exact(_) => None,
        }
    }

    /// Find the entry for `memo` at `pos`.
    ///
    /// With `state`, an entry recorded under a different symbol-table state
    /// is stale: it counts as an invalidation and does not hit.
    pub fn lookup(&mut self, pos: usize, memo: MemoId, state: Option<u32>) -> Option<&MemoEntry<T>> {
        let fresh = |entry: &MemoEntry<T>| match state {
            Some(s) => s == entry.state,
            None => true,
        };
        match &self.store {
            Store::Disabled => None,
            Store::Elastic { slots, shift } => {
                let slot = slots[slot_index(pos, memo, *shift, slots.len())].as_ref()?;
                if slot.pos != pos || slot.memo != memo {
                    return None;
                }
                if fresh(&slot.entry) {
                    self.used += 1;
                    Some(&slot.entry)
                } else {
                    self.invalidated += 1;
                    None
                }
            }
            Store::Exact(map) => {
                let entries = map.get(&pos)?;
                let mut stale = 0;
                let found = entries
                    .iter()
                    .rev()
                    .filter(|(id, _)| *id == memo)
                    .map(|(_, entry)| entry)
                    .find(|entry| {
                        let ok = fresh(entry);
                        stale += u64::from(!ok);
                        ok
                    });
                self.invalidated += stale;
                self.used += u64::from(found.is_some());
                found
            }
        }
    }

    pub fn record(&mut self, pos: usize, memo: MemoId, entry: MemoEntry<T>) {
        match &mut self.store {
            Store::Disabled => return,
            Store::Elastic { slots, shift } => {
                let index = slot_index(pos, memo, *shift, slots.len());
                slots[index] = Some(Slot { pos, memo, entry });
            }
            Store::Exact(map) => map.entry(pos).or_default().push((memo, entry)),
        }
        self.stored += 1;
    }

    /// Entries written, including ones since evicted.
    pub fn stored(&self) -> u64 {
        self.stored
    }

    /// Lookups answered from the table.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Lookups that found an entry recorded under another symbol state.
    pub fn invalidated(&self) -> u64 {
        self.invalidated
    }
}

#[inline]
fn slot_index(pos: usize, memo: MemoId, shift: u32, len: usize) -> usize {
    let key = pos.wrapping_shl(shift) | memo.index();
    key % len
}
