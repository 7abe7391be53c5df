//! Emission of instruction graphs with forward references.
//!
//! Code is emitted in one pass. A branch to code that does not exist yet goes
//! through a [`Label`]: [`ProgramBuilder::target`] hands out a placeholder
//! `InstId` that any payload may carry, and [`ProgramBuilder::finish`]
//! replaces every placeholder once all labels are bound.

use rustc_hash::FxHashMap;

use crate::{
    ByteSet, DispatchId, DispatchTable, Inst, InstId, LitId, MemoId, MemoPoint, Op, Pattern,
    PoolError, Program, ProgramError, SetId, Symbol, SymbolPool,
};

/// Placeholder ids have this bit set; real ids never do.
const PLACEHOLDER: u32 = 1 << 31;

/// A forward reference to an instruction, bound later with [`ProgramBuilder::bind`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Label(u32);

/// Incremental program emitter.
///
/// The two exit terminals are emitted first, so `InstId::EXIT_FAIL` and
/// `InstId::EXIT_OK` are valid targets from the start. Every allocating
/// `try_*` method has a panicking twin for compilers that treat running out
/// of handles as a bug.
#[derive(Debug)]
pub struct ProgramBuilder {
    insts: Vec<Inst>,
    labels: Vec<Option<InstId>>,
    sets: Vec<ByteSet>,
    set_ids: FxHashMap<ByteSet, SetId>,
    literals: Vec<Box<[u8]>>,
    literal_ids: FxHashMap<Box<[u8]>, LitId>,
    dispatch: Vec<DispatchTable>,
    memo_points: Vec<MemoPoint>,
    symbols: SymbolPool,
    rebound: Option<u32>,
}

fn checked_index(len: usize, pool: &'static str) -> Result<u32, PoolError> {
    match u32::try_from(len) {
        Ok(index) if index < PLACEHOLDER => Ok(index),
        _ => Err(PoolError {
            pool,
            count: len,
            max: PLACEHOLDER - 1,
        }),
    }
}

/// Unwrap a pool allocation in the panicking entry points.
#[inline]
fn grow<T>(result: Result<T, PoolError>) -> T {
    result.unwrap_or_else(|err| panic!("{err}"))
}

impl ProgramBuilder {
    pub fn new() -> Self {
        let mut builder = ProgramBuilder {
            insts: Vec::new(),
            labels: Vec::new(),
            sets: Vec::new(),
            set_ids: FxHashMap::default(),
            literals: Vec::new(),
            literal_ids: FxHashMap::default(),
            dispatch: Vec::new(),
            memo_points: Vec::new(),
            symbols: SymbolPool::new(),
            rebound: None,
        };
        builder.emit_to(Op::Exit { ok: false }, InstId::EXIT_FAIL);
        builder.emit_to(Op::Exit { ok: true }, InstId::EXIT_OK);
        builder
    }

    /// Allocate an unbound label.
    pub fn try_label(&mut self) -> Result<Label, PoolError> {
        let label = Label(checked_index(self.labels.len(), "labels")?);
        self.labels.push(None);
        Ok(label)
    }

    /// # Panics
    /// Panics when labels run out; see [`try_label`](Self::try_label).
    pub fn label(&mut self) -> Label {
        grow(self.try_label())
    }

    /// Bind `label` to the next instruction to be emitted.
    pub fn bind(&mut self, label: Label) {
        // Emission stops before ids reach the placeholder bit.
        let here = InstId::new(u32::try_from(self.insts.len()).unwrap_or(PLACEHOLDER));
        let slot = &mut self.labels[label.0 as usize];
        if slot.is_some() {
            self.rebound.get_or_insert(label.0);
        }
        *slot = Some(here);
    }

    /// Placeholder id for `label`, patched by [`finish`](Self::finish).
    pub fn target(&self, label: Label) -> InstId {
        InstId::new(label.0 | PLACEHOLDER)
    }

    /// Id the next emitted instruction will receive.
    pub fn try_next_id(&self) -> Result<InstId, PoolError> {
        checked_index(self.insts.len(), "instructions").map(InstId::new)
    }

    /// # Panics
    /// Panics when instruction ids run out.
    pub fn next_id(&self) -> InstId {
        grow(self.try_next_id())
    }

    /// Emit `op` whose successor is the instruction emitted right after it.
    pub fn try_emit(&mut self, op: Op) -> Result<InstId, PoolError> {
        let id = self.try_next_id()?;
        let next = InstId::new(id.raw() + 1);
        self.insts.push(Inst { op, next });
        Ok(id)
    }

    /// # Panics
    /// Panics when instruction ids run out; see [`try_emit`](Self::try_emit).
    pub fn emit(&mut self, op: Op) -> InstId {
        grow(self.try_emit(op))
    }

    /// Emit `op` with an explicit successor, which may be a placeholder.
    pub fn try_emit_to(&mut self, op: Op, next: InstId) -> Result<InstId, PoolError> {
        let id = self.try_next_id()?;
        self.insts.push(Inst { op, next });
        Ok(id)
    }

    /// # Panics
    /// Panics when instruction ids run out.
    pub fn emit_to(&mut self, op: Op, next: InstId) -> InstId {
        grow(self.try_emit_to(op, next))
    }

    pub fn try_intern(&mut self, name: &str) -> Result<Symbol, PoolError> {
        self.symbols.try_intern(name)
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Add a byte set to the pool, reusing an identical one.
    pub fn try_byte_set(&mut self, set: ByteSet) -> Result<SetId, PoolError> {
        if let Some(&id) = self.set_ids.get(&set) {
            return Ok(id);
        }
        let id = SetId::new(checked_index(self.sets.len(), "byte sets")?);
        self.sets.push(set);
        self.set_ids.insert(set, id);
        Ok(id)
    }

    pub fn byte_set(&mut self, set: ByteSet) -> SetId {
        grow(self.try_byte_set(set))
    }

    /// Add a literal to the pool, reusing an identical one.
    pub fn try_literal(&mut self, bytes: &[u8]) -> Result<LitId, PoolError> {
        if let Some(&id) = self.literal_ids.get(bytes) {
            return Ok(id);
        }
        let id = LitId::new(checked_index(self.literals.len(), "literals")?);
        self.literals.push(Box::from(bytes));
        self.literal_ids.insert(Box::from(bytes), id);
        Ok(id)
    }

    pub fn literal(&mut self, bytes: &[u8]) -> LitId {
        grow(self.try_literal(bytes))
    }

    /// Add a dispatch table. `targets` may hold placeholders.
    pub fn try_dispatch(
        &mut self,
        index: [u8; 257],
        targets: Vec<InstId>,
    ) -> Result<DispatchId, PoolError> {
        let id = DispatchId::new(checked_index(self.dispatch.len(), "dispatch tables")?);
        self.dispatch.push(DispatchTable {
            index: Box::new(index),
            targets,
        });
        Ok(id)
    }

    pub fn dispatch(&mut self, index: [u8; 257], targets: Vec<InstId>) -> DispatchId {
        grow(self.try_dispatch(index, targets))
    }

    /// Allocate the next dense memo point id.
    pub fn try_memo_point(
        &mut self,
        label: Symbol,
        tree_mutating: bool,
        stateful: bool,
    ) -> Result<MemoId, PoolError> {
        let id = MemoId::new(checked_index(self.memo_points.len(), "memo points")?);
        self.memo_points.push(MemoPoint {
            id,
            label,
            tree_mutating,
            stateful,
        });
        Ok(id)
    }

    pub fn memo_point(&mut self, label: Symbol, tree_mutating: bool, stateful: bool) -> MemoId {
        grow(self.try_memo_point(label, tree_mutating, stateful))
    }

    /// Patch every placeholder and validate the graph.
    pub fn finish(self, start: InstId) -> Result<Program, ProgramError> {
        if let Some(label) = self.rebound {
            return Err(ProgramError::LabelRebound { label });
        }

        let labels = self.labels;
        let resolve = |id: InstId| -> Result<InstId, ProgramError> {
            if id.raw() & PLACEHOLDER == 0 {
                return Ok(id);
            }
            let label = id.raw() & !PLACEHOLDER;
            labels
                .get(label as usize)
                .copied()
                .flatten()
                .ok_or(ProgramError::UnboundLabel { label })
        };
        let len = self.insts.len();
        let in_range = |at: InstId, target: InstId| {
            if target.index() < len {
                Ok(())
            } else {
                Err(ProgramError::TargetOutOfRange { at, target })
            }
        };

        let mut insts = self.insts;
        for (i, inst) in insts.iter_mut().enumerate() {
            let at = InstId::new(checked_index(i, "instructions")?);
            inst.next = resolve(inst.next)?;
            if inst.op.uses_next() {
                in_range(at, inst.next)?;
            }
            let mut patched = Ok(());
            inst.op.for_each_target_mut(|target| {
                if patched.is_err() {
                    return;
                }
                patched = resolve(*target).and_then(|resolved| {
                    *target = resolved;
                    in_range(at, resolved)
                });
            });
            patched?;
            check_payload(at, &inst.op, &self.sets, &self.literals, &self.dispatch)?;
            if let Some(memo) = inst.op.memo_id() {
                check_memo_mode(at, &inst.op, memo, &self.memo_points)?;
            }
        }

        let mut dispatch = self.dispatch;
        for (i, table) in dispatch.iter_mut().enumerate() {
            let id = DispatchId::new(checked_index(i, "dispatch tables")?);
            for target in &mut table.targets {
                *target = resolve(*target)?;
                if target.index() >= len {
                    return Err(ProgramError::DispatchTargetOutOfRange {
                        table: id,
                        target: *target,
                    });
                }
            }
            for (slot, &branch) in table.index.iter().enumerate() {
                if usize::from(branch) >= table.targets.len() {
                    return Err(ProgramError::DispatchSlotOutOfRange {
                        table: id,
                        slot,
                        branch,
                        len: table.targets.len(),
                    });
                }
            }
        }

        let start = resolve(start)?;
        if start.index() >= len {
            return Err(ProgramError::StartOutOfRange { start });
        }

        Ok(Program {
            insts,
            sets: self.sets,
            literals: self.literals,
            dispatch,
            memo_points: self.memo_points,
            symbols: self.symbols,
            start,
        })
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tree-linking memo ops need a tree-mutating point, plain ones a pure one.
/// `FailMemo` serves both.
fn check_memo_mode(
    at: InstId,
    op: &Op,
    memo: MemoId,
    points: &[MemoPoint],
) -> Result<(), ProgramError> {
    let Some(point) = points.get(memo.index()) else {
        return Err(ProgramError::UnknownMemoPoint {
            at,
            memo,
            count: points.len(),
        });
    };
    let tree_op = match op {
        Op::TLookup { .. } | Op::TMemo { .. } => true,
        Op::Lookup { .. } | Op::Memo { .. } => false,
        _ => return Ok(()),
    };
    if tree_op == point.tree_mutating {
        Ok(())
    } else {
        Err(ProgramError::MemoModeMismatch {
            at,
            op: op.mnemonic(),
            memo,
        })
    }
}

/// Check that pool ids inside `op` exist.
fn check_payload(
    at: InstId,
    op: &Op,
    sets: &[ByteSet],
    literals: &[Box<[u8]>],
    dispatch: &[DispatchTable],
) -> Result<(), ProgramError> {
    let missing = |pool| Err(ProgramError::UnknownPoolEntry { at, pool });
    let literal = |lit: LitId| {
        if lit.index() < literals.len() {
            Ok(())
        } else {
            missing("literal")
        }
    };
    match op {
        Op::Match {
            pattern: Pattern::Set(set),
            ..
        } if set.index() >= sets.len() => missing("byte set"),
        Op::Match {
            pattern: Pattern::Str(lit),
            ..
        }
        | Op::TReplace { value: lit }
        | Op::TEnd {
            value: Some(lit), ..
        }
        | Op::SIsDef { lit, .. } => literal(*lit),
        Op::Dispatch { table } | Op::DDispatch { table } if table.index() >= dispatch.len() => {
            missing("dispatch table")
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
