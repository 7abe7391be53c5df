//! Compiled grammar representation for the parsing machine.
//!
//! A grammar compiler emits a [`Program`] through a [`ProgramBuilder`]:
//!
//! - [`Inst`] / [`Op`]: the instruction graph, addressed by [`InstId`]
//! - [`ByteSet`], literals and [`DispatchTable`]s: pools indexed by the payloads
//! - [`MemoPoint`]: descriptors of the rules selected for memoization
//! - [`Symbol`] / [`SymbolPool`]: interned tags, labels, rule and table names
//!
//! A finished `Program` is immutable and `Send + Sync`; every parse run
//! borrows it read-only.

mod builder;
mod byte_set;
mod error;
mod inst;
mod program;
mod symbol;

pub use builder::{Label, ProgramBuilder};
pub use byte_set::ByteSet;
pub use error::{PoolError, ProgramError};
pub use inst::{
    DispatchId, DispatchTable, Inst, InstId, LitId, MemoId, MemoPoint, Op, Pattern, Policy, SetId,
};
pub use program::Program;
pub use symbol::{Symbol, SymbolPool};
