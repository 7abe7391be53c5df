//! Instruction set of the parsing machine.
//!
//! Instructions live in one arena addressed by [`InstId`]. Every instruction
//! carries an explicit `next` successor; branching opcodes carry their second
//! successor inside the [`Op`] payload. There is no implicit fall-through.

use std::fmt;

use crate::Symbol;

/// Defines a `u32` index newtype with an invalid sentinel.
macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Invalid index (sentinel value).
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub const fn new(index: u32) -> Self {
                $name(index)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

index_type!(
    /// Index of an instruction in the program arena.
    InstId
);
index_type!(
    /// Index into the byte-set pool.
    SetId
);
index_type!(
    /// Index into the literal pool.
    LitId
);
index_type!(
    /// Index into the dispatch-table pool.
    DispatchId
);
index_type!(
    /// Dense memo point id, `0..N`.
    MemoId
);

impl InstId {
    /// Terminal `Exit { ok: false }`, present in every program.
    pub const EXIT_FAIL: InstId = InstId(0);
    /// Terminal `Exit { ok: true }`, present in every program.
    pub const EXIT_OK: InstId = InstId(1);
}

/// One node of the instruction graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inst {
    pub op: Op,
    /// Successor taken when the instruction completes normally.
    ///
    /// Ignored by opcodes that always transfer elsewhere (`Exit`, `Jump`,
    /// `Ret`, `Fail`, `FailMemo`, dispatches).
    pub next: InstId,
}

/// What a matching instruction tests at the cursor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pattern {
    Byte(u8),
    Set(SetId),
    /// Multi-byte literal.
    Str(LitId),
    /// Any single byte before end of input.
    Any,
}

/// How a matching instruction reacts to its pattern.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Consume on match, fail otherwise.
    Once,
    /// Succeed without consuming exactly when `Once` would fail (`!x`).
    Not,
    /// Consume on match, never fail (`x?`).
    Optional,
    /// Consume greedily while matching, never fail (`x*`).
    Repeat,
}

/// Opcode and payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    // Control flow
    /// Debug marker.
    Nop { name: Symbol },
    /// Terminate the run with the given outcome.
    Exit { ok: bool },
    /// Push the current position.
    Pos,
    /// Pop a saved position and move the cursor back to it.
    Back,
    /// Move the cursor by a signed offset.
    Move { shift: i32 },
    Jump { target: InstId },
    /// Push `ret` as a return frame and transfer to `target`.
    Call { target: InstId, ret: InstId, rule: Symbol },
    Ret,
    /// Push a choice point that resumes at `failure`.
    Alt { failure: InstId },
    /// Discard the nearest choice point.
    Succ,
    Fail,
    /// Fail if the nearest choice point saw no progress, else refresh it.
    Guard,
    /// Same check as `Guard`, emitted at the end of repetition bodies.
    Step,

    // Matching
    Match { pattern: Pattern, policy: Policy },

    // Byte dispatch
    /// Jump through the table indexed by the current byte.
    Dispatch { table: DispatchId },
    /// Like `Dispatch`, but consumes the byte first.
    DDispatch { table: DispatchId },

    // Tree construction
    /// Open a node at `pos + shift`.
    TBegin { shift: i32 },
    /// Close the node at `pos + shift`, optionally tagging and replacing it.
    TEnd { shift: i32, tag: Symbol, value: Option<LitId> },
    TTag { tag: Symbol },
    TReplace { value: LitId },
    /// Fold the node built so far into a new node as its first child.
    TFold { shift: i32, label: Symbol },
    /// Open a nested construction scope.
    TPush,
    /// Close the nested scope and link it under `label`.
    TPop { label: Symbol },
    /// Push an AST checkpoint.
    TStart,
    /// Commit everything after the checkpoint as one linked child.
    TEmit { label: Symbol },

    // Symbol table
    /// Push a symbol checkpoint.
    SOpen,
    /// Pop a symbol checkpoint and restore it.
    SClose,
    /// Push a symbol checkpoint, then hide `table`.
    SMask { table: Symbol },
    /// Bind `table` to the bytes since the saved position.
    SDef { table: Symbol },
    /// Fail unless `table` has a visible binding.
    SExists { table: Symbol },
    /// Fail unless `lit` is among the visible bindings of `table`.
    SIsDef { table: Symbol, lit: LitId },
    /// Consume the most recent binding of `table`.
    SMatch { table: Symbol },
    /// Fail unless the bytes since the saved position equal the most recent binding.
    SIs { table: Symbol },
    /// Fail unless the bytes since the saved position are a visible binding.
    SIsa { table: Symbol },

    // Counted repetition
    /// Read the bytes since the saved position as a big-endian count.
    NScan { mask: u64, shift: u32 },
    /// Decrement the count; jump to `exit` when exhausted.
    NDec { exit: InstId },

    // Memoization
    Lookup { memo: MemoId, skip: InstId },
    Memo { memo: MemoId },
    FailMemo { memo: MemoId },
    TLookup { memo: MemoId, label: Symbol, skip: InstId },
    TMemo { memo: MemoId },
}

impl Op {
    /// Lower-case mnemonic, as printed in listings.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Nop { .. } => "nop",
            Op::Exit { .. } => "exit",
            Op::Pos => "pos",
            Op::Back => "back",
            Op::Move { .. } => "move",
            Op::Jump { .. } => "jump",
            Op::Call { .. } => "call",
            Op::Ret => "ret",
            Op::Alt { .. } => "alt",
            Op::Succ => "succ",
            Op::Fail => "fail",
            Op::Guard => "guard",
            Op::Step => "step",
            Op::Match { pattern, policy } => match (policy, pattern) {
                (Policy::Once, Pattern::Byte(_)) => "byte",
                (Policy::Once, Pattern::Set(_)) => "set",
                (Policy::Once, Pattern::Str(_)) => "str",
                (Policy::Once, Pattern::Any) => "any",
                (Policy::Not, Pattern::Byte(_)) => "nbyte",
                (Policy::Not, Pattern::Set(_)) => "nset",
                (Policy::Not, Pattern::Str(_)) => "nstr",
                (Policy::Not, Pattern::Any) => "nany",
                (Policy::Optional, Pattern::Byte(_)) => "obyte",
                (Policy::Optional, Pattern::Set(_)) => "oset",
                (Policy::Optional, Pattern::Str(_)) => "ostr",
                (Policy::Optional, Pattern::Any) => "oany",
                (Policy::Repeat, Pattern::Byte(_)) => "rbyte",
                (Policy::Repeat, Pattern::Set(_)) => "rset",
                (Policy::Repeat, Pattern::Str(_)) => "rstr",
                (Policy::Repeat, Pattern::Any) => "rany",
            },
            Op::Dispatch { .. } => "dispatch",
            Op::DDispatch { .. } => "ddispatch",
            Op::TBegin { .. } => "tbegin",
            Op::TEnd { .. } => "tend",
            Op::TTag { .. } => "ttag",
            Op::TReplace { .. } => "treplace",
            Op::TFold { .. } => "tfold",
            Op::TPush => "tpush",
            Op::TPop { .. } => "tpop",
            Op::TStart => "tstart",
            Op::TEmit { .. } => "temit",
            Op::SOpen => "sopen",
            Op::SClose => "sclose",
            Op::SMask { .. } => "smask",
            Op::SDef { .. } => "sdef",
            Op::SExists { .. } => "sexists",
            Op::SIsDef { .. } => "sisdef",
            Op::SMatch { .. } => "smatch",
            Op::SIs { .. } => "sis",
            Op::SIsa { .. } => "sisa",
            Op::NScan { .. } => "nscan",
            Op::NDec { .. } => "ndec",
            Op::Lookup { .. } => "lookup",
            Op::Memo { .. } => "memo",
            Op::FailMemo { .. } => "failmemo",
            Op::TLookup { .. } => "tlookup",
            Op::TMemo { .. } => "tmemo",
        }
    }

    /// Whether control may continue at the instruction's `next` successor.
    pub fn uses_next(&self) -> bool {
        !matches!(
            self,
            Op::Exit { .. }
                | Op::Jump { .. }
                | Op::Ret
                | Op::Fail
                | Op::FailMemo { .. }
                | Op::Dispatch { .. }
                | Op::DDispatch { .. }
        )
    }

    /// Visit every instruction target stored in the payload.
    ///
    /// Dispatch targets live in the dispatch pool and are not visited here.
    pub fn for_each_target_mut(&mut self, mut f: impl FnMut(&mut InstId)) {
        match self {
            Op::Jump { target } => f(target),
            Op::Call { target, ret, .. } => {
                f(target);
                f(ret);
            }
            Op::Alt { failure } => f(failure),
            Op::NDec { exit } => f(exit),
            Op::Lookup { skip, .. } | Op::TLookup { skip, .. } => f(skip),
            _ => {}
        }
    }

    /// The memo point referenced by the payload, if any.
    pub fn memo_id(&self) -> Option<MemoId> {
        match self {
            Op::Lookup { memo, .. }
            | Op::Memo { memo }
            | Op::FailMemo { memo }
            | Op::TLookup { memo, .. }
            | Op::TMemo { memo } => Some(*memo),
            _ => None,
        }
    }
}

/// Byte-indexed jump table.
///
/// `index` has one slot per byte value plus slot 256 for end of input; each
/// slot selects an entry of `targets`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchTable {
    pub index: Box<[u8; 257]>,
    pub targets: Vec<InstId>,
}

impl DispatchTable {
    /// Slot used when the cursor is at end of input.
    pub const EOF_SLOT: usize = 256;

    /// Target for `byte`, or for end of input when `None`.
    #[inline]
    pub fn target(&self, byte: Option<u8>) -> InstId {
        let slot = byte.map_or(Self::EOF_SLOT, usize::from);
        self.targets[usize::from(self.index[slot])]
    }
}

/// Per-rule memoization descriptor.
///
/// Only rules selected by the compiler get one. Runtime hit/miss counters are
/// kept per run, not here, so a `Program` stays immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoPoint {
    pub id: MemoId,
    pub label: Symbol,
    /// Whether evaluating the rule mutates the AST log.
    pub tree_mutating: bool,
    /// Whether the rule's outcome depends on symbol-table content.
    pub stateful: bool,
}
