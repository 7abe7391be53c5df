//! The instruction loop.
//!
//! One [`Machine`] runs one program over one input. It owns the cursor, the
//! frame stack and the three revocable state managers (AST log, symbol table,
//! memo table); nothing mutable is shared between runs.
//!
//! Choice points, return addresses and operand frames share one `Vec`.
//! `catch` indexes the innermost choice point, and each choice point records
//! the previous `catch`, so failure unwinds in O(1) by truncating the stack.

use moz_ir::{InstId, MemoId, Op, Pattern, Policy, Program, Symbol};
use thiserror::Error;
use tracing::{debug, trace};

use crate::ast::{AstLog, AstMark, TreeFactory};
use crate::memo::{MemoEntry, MemoTable};
use crate::symbol_table::{SymbolMark, SymbolTable};
use crate::{ParseOutcome, ParseStats, ParserOptions, Source};

/// The program broke the machine's stack discipline.
///
/// A finished `Program` is validated structurally, but frame balance depends
/// on control flow and is only checked as the machine runs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("`{op}` at {at:?} expected a {expected} frame, found {found}")]
    FrameMismatch {
        at: InstId,
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{op}` at {at:?} has no enclosing choice point")]
    NoChoicePoint { at: InstId, op: &'static str },

    #[error("`{op}` at {at:?} moves the cursor before the start of input")]
    CursorUnderflow { at: InstId, op: &'static str },
}

#[derive(Copy, Clone, Debug)]
enum Frame {
    Choice {
        failure: InstId,
        pos: usize,
        ast: AstMark,
        sym: SymbolMark,
        prev_catch: Option<usize>,
    },
    Return(InstId),
    Pos(usize),
    Ast(AstMark),
    Sym(SymbolMark),
    Count(u64),
}

impl Frame {
    fn kind(&self) -> &'static str {
        match self {
            Frame::Choice { .. } => "choice",
            Frame::Return(_) => "return",
            Frame::Pos(_) => "position",
            Frame::Ast(_) => "tree checkpoint",
            Frame::Sym(_) => "symbol checkpoint",
            Frame::Count(_) => "counter",
        }
    }
}

enum Control {
    Continue(InstId),
    Exit(bool),
}

/// Apply a signed instruction offset to a position.
fn offset(pos: usize, shift: i32) -> Option<usize> {
    let magnitude = usize::try_from(shift.unsigned_abs()).ok()?;
    if shift < 0 {
        pos.checked_sub(magnitude)
    } else {
        pos.checked_add(magnitude)
    }
}

/// Read a counted-repetition count from captured bytes.
///
/// A zero mask reads leading ASCII decimal digits; otherwise the bytes are a
/// big-endian integer, masked and shifted.
fn scan_count(bytes: &[u8], mask: u64, shift: u32) -> u64 {
    if mask == 0 {
        return bytes
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .fold(0u64, |n, b| {
                n.wrapping_mul(10).wrapping_add(u64::from(b - b'0'))
            });
    }
    let value = bytes.iter().fold(0u64, |n, &b| (n << 8) | u64::from(b));
    (value & mask).checked_shr(shift).unwrap_or(0)
}

/// Parsing machine for one run.
pub struct Machine<'p, 's, S: Source + ?Sized, F: TreeFactory> {
    program: &'p Program,
    source: &'s S,
    factory: F,
    pos: usize,
    /// Furthest position left behind by a rollback.
    head: usize,
    stack: Vec<Frame>,
    catch: Option<usize>,
    ast: AstLog<'p, F::Tree>,
    symbols: SymbolTable,
    memo: MemoTable<F::Tree>,
    stats: ParseStats,
    reject_unconsumed: bool,
}

impl<'p, 's, S, F> Machine<'p, 's, S, F>
where
    S: Source + ?Sized,
    F: TreeFactory,
{
    pub fn new(program: &'p Program, source: &'s S, factory: F, options: &ParserOptions) -> Self {
        let points = program.memo_points().len();
        Machine {
            program,
            source,
            factory,
            pos: 0,
            head: 0,
            stack: Vec::with_capacity(64),
            catch: None,
            ast: if options.tree_construction {
                AstLog::new()
            } else {
                AstLog::disabled()
            },
            symbols: SymbolTable::new(),
            memo: MemoTable::for_options(options, points),
            stats: ParseStats::with_memo_points(points),
            reject_unconsumed: options.reject_unconsumed,
        }
    }

    /// Execute from `start` until an exit instruction.
    ///
    /// Returns whether the input matched. A parse failure is `Ok(false)`;
    /// `Err` means the program itself is malformed.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(start = start.raw(), len = self.source.len())
    )]
    pub fn run(&mut self, start: InstId) -> Result<bool, ExecError> {
        trace!(listing = %self.program, "program");
        self.stack.push(Frame::Return(InstId::EXIT_OK));
        let mut at = start;
        let matched = loop {
            match self.step(at)? {
                Control::Continue(next) => at = next,
                Control::Exit(matched) => break matched,
            }
        };
        self.stats.memo_stored = self.memo.stored();
        self.stats.memo_used = self.memo.used();
        self.stats.memo_invalidated = self.memo.invalidated();
        debug!(
            matched,
            trees = self.ast.is_enabled(),
            memo_slots = ?self.memo.slots(),
            pos = self.pos,
            max_pos = self.head.max(self.pos),
            failures = self.stats.failures,
            backtracks = self.stats.backtracks,
            longest_backtrack = self.stats.longest_backtrack,
            memo_stored = self.stats.memo_stored,
            memo_used = self.stats.memo_used,
            memo_invalidated = self.stats.memo_invalidated,
            "run finished"
        );
        Ok(matched)
    }

    /// Package the run's results, building the tree on success.
    pub fn into_outcome(mut self, matched: bool) -> ParseOutcome<F::Tree> {
        let tree = matched.then(|| self.ast.parse_result(0..self.pos, &mut self.factory));
        ParseOutcome {
            matched,
            tree,
            position: self.pos,
            max_position: self.head.max(self.pos),
            stats: self.stats,
            reject_unconsumed: self.reject_unconsumed,
        }
    }

    #[inline]
    fn rollback(&mut self, pos: usize) {
        if self.head < self.pos {
            self.head = self.pos;
        }
        self.pos = pos;
    }

    /// Unwind to the innermost choice point and resume at its failure target.
    ///
    /// With no choice point left, the run fails.
    fn fail(&mut self, at: InstId) -> Result<InstId, ExecError> {
        let Some(catch) = self.catch else {
            self.stats.backtrack(self.pos, self.pos, self.head);
            trace!(pos = self.pos, "fail without choice point");
            return Ok(InstId::EXIT_FAIL);
        };
        let Some(&Frame::Choice {
            failure,
            pos,
            ast,
            sym,
            prev_catch,
        }) = self.stack.get(catch)
        else {
            return Err(self.mismatch(at, "fail", "choice", catch));
        };
        self.stack.truncate(catch);
        self.catch = prev_catch;
        self.stats.backtrack(pos, self.pos, self.head);
        trace!(from = self.pos, to = pos, target = failure.raw(), "backtrack");
        self.rollback(pos);
        self.ast.abort(ast);
        self.symbols.restore(sym);
        Ok(failure)
    }

    fn mismatch(
        &self,
        at: InstId,
        op: &'static str,
        expected: &'static str,
        index: usize,
    ) -> ExecError {
        ExecError::FrameMismatch {
            at,
            op,
            expected,
            found: self.stack.get(index).map_or("nothing", Frame::kind),
        }
    }

    /// Discard the innermost choice point, returning its saved position and
    /// symbol checkpoint.
    fn pop_choice(
        &mut self,
        at: InstId,
        op: &'static str,
    ) -> Result<(usize, SymbolMark), ExecError> {
        let catch = self.catch.ok_or(ExecError::NoChoicePoint { at, op })?;
        match self.stack.get(catch) {
            Some(&Frame::Choice {
                pos, sym, prev_catch, ..
            }) => {
                self.stack.truncate(catch);
                self.catch = prev_catch;
                Ok((pos, sym))
            }
            _ => Err(self.mismatch(at, op, "choice", catch)),
        }
    }

    /// Pop the top frame. Choice points are never popped here; only `succ`,
    /// failure and the memo opcodes remove them.
    fn pop(
        &mut self,
        at: InstId,
        op: &'static str,
        expected: &'static str,
    ) -> Result<Frame, ExecError> {
        let top = self.stack.len().saturating_sub(1);
        if self.catch == Some(top) {
            return Err(self.mismatch(at, op, expected, top));
        }
        self.stack
            .pop()
            .ok_or_else(|| self.mismatch(at, op, expected, top))
    }

    fn pop_pos(&mut self, at: InstId, op: &'static str) -> Result<usize, ExecError> {
        match self.pop(at, op, "position")? {
            Frame::Pos(pos) => Ok(pos),
            other => Err(Self::unexpected(at, op, "position", other)),
        }
    }

    fn unexpected(at: InstId, op: &'static str, expected: &'static str, found: Frame) -> ExecError {
        ExecError::FrameMismatch {
            at,
            op,
            expected,
            found: found.kind(),
        }
    }

    fn shifted(&self, at: InstId, op: &'static str, shift: i32) -> Result<usize, ExecError> {
        offset(self.pos, shift).ok_or(ExecError::CursorUnderflow { at, op })
    }

    /// Length of `pattern` at `pos`, or `None` if it does not match.
    #[inline]
    fn match_len(&self, pattern: Pattern, pos: usize) -> Option<usize> {
        match pattern {
            Pattern::Byte(b) => (self.source.byte_at(pos) == Some(b)).then_some(1),
            Pattern::Set(set) => {
                let set = self.program.byte_set(set);
                self.source
                    .byte_at(pos)
                    .filter(|&b| set.contains(b))
                    .map(|_| 1)
            }
            Pattern::Str(lit) => {
                let lit = self.program.literal(lit);
                self.source.matches_at(pos, lit).then_some(lit.len())
            }
            Pattern::Any => self.source.byte_at(pos).map(|_| 1),
        }
    }

    fn memo_state(&self, memo: MemoId) -> Option<u32> {
        self.program
            .memo_point(memo)
            .stateful
            .then(|| self.symbols.state())
    }

    /// Record the success of the memoized rule whose choice point is innermost.
    fn memo_succeed(
        &mut self,
        at: InstId,
        op: &'static str,
        memo: MemoId,
        result: Option<F::Tree>,
    ) -> Result<(), ExecError> {
        let (start, sym) = self.pop_choice(at, op)?;
        let stateful = self.program.memo_point(memo).stateful;
        let entry = MemoEntry {
            failed: false,
            consumed: self.pos.saturating_sub(start),
            result,
            // Keyed by the state the rule was entered with.
            state: if stateful { self.symbols.state_at(sym) } else { 0 },
        };
        self.memo.record(start, memo, entry);
        Ok(())
    }

    /// Consult the memo table. `Some(target)` when the lookup decided control
    /// flow, `None` on a miss.
    fn memo_lookup(
        &mut self,
        at: InstId,
        memo: MemoId,
        skip: InstId,
        label: Option<Symbol>,
    ) -> Result<Option<InstId>, ExecError> {
        let state = self.memo_state(memo);
        let hit = self
            .memo
            .lookup(self.pos, memo, state)
            .map(|entry| {
                let result = label.and_then(|_| entry.result.clone());
                (entry.failed, entry.consumed, result)
            });
        let point = &mut self.stats.memo_points[memo.index()];
        match hit {
            None => {
                point.miss();
                Ok(None)
            }
            Some((true, _, _)) => {
                point.fail_hit();
                trace!(pos = self.pos, memo = memo.raw(), "memo fail hit");
                self.fail(at).map(Some)
            }
            Some((false, consumed, result)) => {
                point.hit(consumed);
                trace!(pos = self.pos, memo = memo.raw(), consumed, "memo hit");
                self.pos += consumed;
                if let Some(label) = label {
                    self.ast.link(label, result);
                }
                Ok(Some(skip))
            }
        }
    }

    fn step(&mut self, at: InstId) -> Result<Control, ExecError> {
        let program = self.program;
        let inst = program.inst(at);
        let next = inst.next;
        let target = match &inst.op {
            // Control flow
            Op::Nop { name } => {
                trace!(pos = self.pos, name = program.symbols().name(*name), "nop");
                next
            }
            Op::Exit { ok } => return Ok(Control::Exit(*ok)),
            Op::Pos => {
                self.stack.push(Frame::Pos(self.pos));
                next
            }
            Op::Back => {
                let pos = self.pop_pos(at, "back")?;
                self.rollback(pos);
                next
            }
            Op::Move { shift } => {
                let pos = self.shifted(at, "move", *shift)?;
                self.rollback(pos);
                next
            }
            Op::Jump { target } => *target,
            Op::Call { target, ret, .. } => {
                self.stack.push(Frame::Return(*ret));
                *target
            }
            Op::Ret => match self.pop(at, "ret", "return")? {
                Frame::Return(ret) => ret,
                other => return Err(Self::unexpected(at, "ret", "return", other)),
            },
            Op::Alt { failure } => {
                self.stack.push(Frame::Choice {
                    failure: *failure,
                    pos: self.pos,
                    ast: self.ast.mark(),
                    sym: self.symbols.save(),
                    prev_catch: self.catch,
                });
                self.catch = Some(self.stack.len() - 1);
                next
            }
            Op::Succ => {
                self.pop_choice(at, "succ")?;
                next
            }
            Op::Fail => self.fail(at)?,
            Op::Guard | Op::Step => {
                let here = self.pos;
                let (ast, sym) = (self.ast.mark(), self.symbols.save());
                let catch = self.catch.ok_or(ExecError::NoChoicePoint {
                    at,
                    op: inst.op.mnemonic(),
                })?;
                match self.stack.get_mut(catch) {
                    Some(Frame::Choice {
                        pos,
                        ast: saved_ast,
                        sym: saved_sym,
                        ..
                    }) => {
                        if *pos == here {
                            self.fail(at)?
                        } else {
                            *pos = here;
                            *saved_ast = ast;
                            *saved_sym = sym;
                            next
                        }
                    }
                    _ => return Err(self.mismatch(at, inst.op.mnemonic(), "choice", catch)),
                }
            }

            // Matching
            Op::Match { pattern, policy } => match (policy, self.match_len(*pattern, self.pos)) {
                (Policy::Once | Policy::Optional, Some(len)) => {
                    self.pos += len;
                    next
                }
                (Policy::Once, None) | (Policy::Not, Some(_)) => self.fail(at)?,
                (Policy::Not | Policy::Optional, None) => next,
                (Policy::Repeat, mut matched) => {
                    while let Some(len) = matched.filter(|&len| len > 0) {
                        self.pos += len;
                        matched = self.match_len(*pattern, self.pos);
                    }
                    next
                }
            },

            // Byte dispatch
            Op::Dispatch { table } => {
                let byte = self.source.byte_at(self.pos);
                program.dispatch(*table).target(byte)
            }
            Op::DDispatch { table } => {
                let byte = self.source.byte_at(self.pos);
                if byte.is_some() {
                    self.pos += 1;
                }
                program.dispatch(*table).target(byte)
            }

            // Tree construction
            Op::TBegin { shift } => {
                self.ast.begin(self.shifted(at, "tbegin", *shift)?);
                next
            }
            Op::TEnd { shift, tag, value } => {
                self.ast.capture(self.shifted(at, "tend", *shift)?);
                if !tag.is_null() {
                    self.ast.tag(*tag);
                }
                if let Some(value) = value {
                    self.ast.replace(program.literal(*value));
                }
                next
            }
            Op::TTag { tag } => {
                self.ast.tag(*tag);
                next
            }
            Op::TReplace { value } => {
                self.ast.replace(program.literal(*value));
                next
            }
            Op::TFold { shift, label } => {
                self.ast.fold(self.shifted(at, "tfold", *shift)?, *label);
                next
            }
            Op::TPush => {
                self.ast.push();
                next
            }
            Op::TPop { label } => {
                self.ast.pop(*label);
                next
            }
            Op::TStart => {
                self.stack.push(Frame::Ast(self.ast.mark()));
                next
            }
            Op::TEmit { label } => match self.pop(at, "temit", "tree checkpoint")? {
                Frame::Ast(mark) => {
                    self.ast.commit(mark, *label, &mut self.factory);
                    next
                }
                other => return Err(Self::unexpected(at, "temit", "tree checkpoint", other)),
            },

            // Symbol table
            Op::SOpen => {
                self.stack.push(Frame::Sym(self.symbols.save()));
                next
            }
            Op::SClose => match self.pop(at, "sclose", "symbol checkpoint")? {
                Frame::Sym(mark) => {
                    self.symbols.restore(mark);
                    next
                }
                other => return Err(Self::unexpected(at, "sclose", "symbol checkpoint", other)),
            },
            Op::SMask { table } => {
                self.stack.push(Frame::Sym(self.symbols.save()));
                self.symbols.mask(*table);
                next
            }
            Op::SDef { table } => {
                let start = self.pop_pos(at, "sdef")?;
                let captured = self.source.sub_bytes(start, self.pos);
                self.symbols.define(*table, captured);
                next
            }
            Op::SExists { table } => {
                if self.symbols.exists(*table) {
                    next
                } else {
                    self.fail(at)?
                }
            }
            Op::SIsDef { table, lit } => {
                if self.symbols.contains(*table, program.literal(*lit)) {
                    next
                } else {
                    self.fail(at)?
                }
            }
            Op::SMatch { table } => {
                let len = match self.symbols.lookup(*table) {
                    None => Some(0),
                    Some(bound) => self.source.matches_at(self.pos, bound).then_some(bound.len()),
                };
                match len {
                    Some(len) => {
                        self.pos += len;
                        next
                    }
                    None => self.fail(at)?,
                }
            }
            Op::SIs { table } | Op::SIsa { table } => {
                let start = self.pop_pos(at, inst.op.mnemonic())?;
                let captured = self.source.sub_bytes(start, self.pos);
                let ok = if matches!(inst.op, Op::SIs { .. }) {
                    self.symbols.matches(*table, captured)
                } else {
                    self.symbols.contains(*table, captured)
                };
                if ok {
                    next
                } else {
                    self.fail(at)?
                }
            }

            // Counted repetition
            Op::NScan { mask, shift } => {
                let start = self.pop_pos(at, "nscan")?;
                let count = scan_count(self.source.sub_bytes(start, self.pos), *mask, *shift);
                self.stack.push(Frame::Count(count));
                next
            }
            Op::NDec { exit } => match self.stack.last_mut() {
                Some(Frame::Count(0)) => {
                    self.stack.pop();
                    *exit
                }
                Some(Frame::Count(n)) => {
                    *n -= 1;
                    next
                }
                _ => {
                    let top = self.stack.len().saturating_sub(1);
                    return Err(self.mismatch(at, "ndec", "counter", top));
                }
            },

            // Memoization
            Op::Lookup { memo, skip } => self
                .memo_lookup(at, *memo, *skip, None)?
                .unwrap_or(next),
            Op::TLookup { memo, label, skip } => self
                .memo_lookup(at, *memo, *skip, Some(*label))?
                .unwrap_or(next),
            Op::Memo { memo } => {
                self.memo_succeed(at, "memo", *memo, None)?;
                next
            }
            Op::TMemo { memo } => {
                let result = self.ast.latest_linked().cloned();
                self.memo_succeed(at, "tmemo", *memo, result)?;
                next
            }
            Op::FailMemo { memo } => {
                let entry = MemoEntry {
                    failed: true,
                    consumed: 0,
                    result: None,
                    state: self.memo_state(*memo).unwrap_or(0),
                };
                self.memo.record(self.pos, *memo, entry);
                self.fail(at)?
            }
        };
        Ok(Control::Continue(target))
    }
}
