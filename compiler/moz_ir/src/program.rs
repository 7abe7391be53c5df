//! The compiled, immutable grammar artifact.

use std::fmt;

use crate::{
    ByteSet, DispatchId, DispatchTable, Inst, InstId, LitId, MemoId, MemoPoint, Op, Pattern,
    SetId, Symbol, SymbolPool,
};

/// Instruction arena plus the pools its payloads index into.
///
/// Produced by [`crate::ProgramBuilder::finish`], which guarantees every
/// successor, pool id and memo id is in range. Never mutated afterwards, so
/// any number of parse runs may share one `&Program` across threads.
#[derive(Clone, Debug)]
pub struct Program {
    pub(crate) insts: Vec<Inst>,
    pub(crate) sets: Vec<ByteSet>,
    pub(crate) literals: Vec<Box<[u8]>>,
    pub(crate) dispatch: Vec<DispatchTable>,
    pub(crate) memo_points: Vec<MemoPoint>,
    pub(crate) symbols: SymbolPool,
    pub(crate) start: InstId,
}

impl Program {
    #[inline]
    pub fn inst(&self, id: InstId) -> &Inst {
        &self.insts[id.index()]
    }

    #[inline]
    pub fn byte_set(&self, id: SetId) -> &ByteSet {
        &self.sets[id.index()]
    }

    #[inline]
    pub fn literal(&self, id: LitId) -> &[u8] {
        &self.literals[id.index()]
    }

    #[inline]
    pub fn dispatch(&self, id: DispatchId) -> &DispatchTable {
        &self.dispatch[id.index()]
    }

    #[inline]
    pub fn memo_point(&self, id: MemoId) -> &MemoPoint {
        &self.memo_points[id.index()]
    }

    pub fn memo_points(&self) -> &[MemoPoint] {
        &self.memo_points
    }

    pub fn symbols(&self) -> &SymbolPool {
        &self.symbols
    }

    /// Entry instruction of the grammar's start rule.
    pub fn start(&self) -> InstId {
        self.start
    }

    /// Number of instructions, including the two exit terminals.
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Always `false`: the exit terminals are always present.
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    fn fmt_operands(&self, op: &Op, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |sym: Symbol| self.symbols.name(sym);
        match op {
            Op::Nop { name: n } => write!(f, " {}", name(*n)),
            Op::Exit { ok } => write!(f, " {ok}"),
            Op::Move { shift } | Op::TBegin { shift } => write!(f, " {shift}"),
            Op::Jump { target } => write!(f, " L{}", target.raw()),
            Op::Call { target, ret, rule } => {
                write!(f, " {} L{} ret L{}", name(*rule), target.raw(), ret.raw())
            }
            Op::Alt { failure } => write!(f, " L{}", failure.raw()),
            Op::Match { pattern, .. } => match pattern {
                Pattern::Byte(b) => write!(f, " '{}'", b.escape_ascii()),
                Pattern::Set(set) => write!(f, " {:?}", self.byte_set(*set)),
                Pattern::Str(lit) => write!(f, " \"{}\"", self.literal(*lit).escape_ascii()),
                Pattern::Any => Ok(()),
            },
            Op::Dispatch { table } | Op::DDispatch { table } => {
                let table = self.dispatch(*table);
                write!(f, " [")?;
                for (i, target) in table.targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "L{}", target.raw())?;
                }
                write!(f, "]")
            }
            Op::TEnd { shift, tag, value } => {
                write!(f, " {shift} #{}", name(*tag))?;
                if let Some(value) = value {
                    write!(f, " `{}`", self.literal(*value).escape_ascii())?;
                }
                Ok(())
            }
            Op::TTag { tag } => write!(f, " #{}", name(*tag)),
            Op::TReplace { value } => write!(f, " `{}`", self.literal(*value).escape_ascii()),
            Op::TFold { shift, label } => write!(f, " {shift} ${}", name(*label)),
            Op::TPop { label } | Op::TEmit { label } => write!(f, " ${}", name(*label)),
            Op::SMask { table }
            | Op::SDef { table }
            | Op::SExists { table }
            | Op::SMatch { table }
            | Op::SIs { table }
            | Op::SIsa { table } => write!(f, " {}", name(*table)),
            Op::SIsDef { table, lit } => {
                write!(f, " {} \"{}\"", name(*table), self.literal(*lit).escape_ascii())
            }
            Op::NScan { mask, shift } => write!(f, " {mask:#x} {shift}"),
            Op::NDec { exit } => write!(f, " L{}", exit.raw()),
            Op::Lookup { memo, skip } => {
                write!(f, " {} L{}", name(self.memo_point(*memo).label), skip.raw())
            }
            Op::TLookup { memo, label, skip } => write!(
                f,
                " {} ${} L{}",
                name(self.memo_point(*memo).label),
                name(*label),
                skip.raw()
            ),
            Op::Memo { memo } | Op::FailMemo { memo } | Op::TMemo { memo } => {
                write!(f, " {}", name(self.memo_point(*memo).label))
            }
            Op::Pos
            | Op::Back
            | Op::Ret
            | Op::Succ
            | Op::Fail
            | Op::Guard
            | Op::Step
            | Op::TPush
            | Op::TStart
            | Op::SOpen
            | Op::SClose => Ok(()),
        }
    }
}

impl fmt::Display for Program {
    /// Disassembly listing, one instruction per line.
    ///
    /// A successor other than the following line is printed as `-> Ln`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, inst) in self.insts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let label = format!("L{i}");
            write!(f, "{label:<5} {}", inst.op.mnemonic())?;
            self.fmt_operands(&inst.op, f)?;
            if inst.op.uses_next() && inst.next.index() != i + 1 {
                write!(f, " -> L{}", inst.next.raw())?;
            }
            if i == self.start.index() {
                write!(f, "  ; start")?;
            }
        }
        Ok(())
    }
}
