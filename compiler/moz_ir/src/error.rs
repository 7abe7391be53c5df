//! Program validation and pool capacity errors.

use thiserror::Error;

use crate::{DispatchId, InstId, MemoId};

/// A pool or arena ran out of handle space.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{pool} exceeded capacity: {count} entries, max is {max}")]
pub struct PoolError {
    pub pool: &'static str,
    pub count: usize,
    pub max: u32,
}

/// A structural defect found while finishing a [`crate::ProgramBuilder`].
///
/// Any of these means the emitting compiler broke its contract; the machine
/// never sees such a program.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProgramError {
    #[error("label {label} is referenced but never bound")]
    UnboundLabel { label: u32 },

    #[error("label {label} is bound twice")]
    LabelRebound { label: u32 },

    #[error("instruction {at:?} refers to {target:?}, outside the program")]
    TargetOutOfRange { at: InstId, target: InstId },

    #[error("start instruction {start:?} is outside the program")]
    StartOutOfRange { start: InstId },

    #[error("dispatch table {table:?} slot {slot} selects branch {branch}, but it has {len} branches")]
    DispatchSlotOutOfRange {
        table: DispatchId,
        slot: usize,
        branch: u8,
        len: usize,
    },

    #[error("dispatch table {table:?} branches to {target:?}, outside the program")]
    DispatchTargetOutOfRange { table: DispatchId, target: InstId },

    #[error("instruction {at:?} uses memo point {memo:?}, but only {count} exist")]
    UnknownMemoPoint { at: InstId, memo: MemoId, count: usize },

    #[error("instruction {at:?} refers to a missing {pool} entry")]
    UnknownPoolEntry { at: InstId, pool: &'static str },

    #[error("`{op}` at {at:?} uses memo point {memo:?}, whose tree mode does not match")]
    MemoModeMismatch {
        at: InstId,
        op: &'static str,
        memo: MemoId,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}
