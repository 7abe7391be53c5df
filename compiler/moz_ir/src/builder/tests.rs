#![allow(clippy::unwrap_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;

use super::*;
use crate::Policy;

fn byte(b: u8) -> Op {
    Op::Match {
        pattern: Pattern::Byte(b),
        policy: Policy::Once,
    }
}

#[test]
fn test_exit_terminals_present() {
    let program = ProgramBuilder::new()
        .finish(InstId::EXIT_OK)
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(program.len(), 2);
    assert_eq!(program.inst(InstId::EXIT_FAIL).op, Op::Exit { ok: false });
    assert_eq!(program.inst(InstId::EXIT_OK).op, Op::Exit { ok: true });
}

#[test]
fn test_forward_label_is_patched() {
    let mut b = ProgramBuilder::new();
    let alt = b.label();
    let start = b.emit(Op::Alt {
        failure: b.target(alt),
    });
    b.emit(byte(b'a'));
    b.emit_to(Op::Succ, InstId::EXIT_OK);
    b.bind(alt);
    let other = b.emit_to(byte(b'b'), InstId::EXIT_OK);

    let program = b.finish(start).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(program.inst(start).op, Op::Alt { failure: other });
    assert_eq!(program.inst(start).next, InstId::new(start.raw() + 1));
    assert_eq!(program.start(), start);
}

#[test]
fn test_label_as_successor() {
    let mut b = ProgramBuilder::new();
    let done = b.label();
    let start = b.emit_to(byte(b'x'), b.target(done));
    b.bind(done);
    let end = b.emit_to(Op::Succ, InstId::EXIT_OK);
    let program = b.finish(start).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(program.inst(start).next, end);
}

#[test]
fn test_unbound_label_rejected() {
    let mut b = ProgramBuilder::new();
    let never = b.label();
    let start = b.emit(Op::Jump {
        target: b.target(never),
    });
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::UnboundLabel { label: 0 })
    );
}

#[test]
fn test_label_bound_twice_rejected() {
    let mut b = ProgramBuilder::new();
    let l = b.label();
    b.bind(l);
    let start = b.emit_to(Op::Nop { name: Symbol::NULL }, InstId::EXIT_OK);
    b.bind(l);
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::LabelRebound { label: 0 })
    );
}

#[test]
fn test_dangling_next_rejected() {
    let mut b = ProgramBuilder::new();
    // Last instruction falls off the end of the arena.
    let start = b.emit(byte(b'a'));
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::TargetOutOfRange {
            at: start,
            target: InstId::new(3),
        })
    );
}

#[test]
fn test_jump_ignores_next() {
    let mut b = ProgramBuilder::new();
    let start = b.emit(Op::Jump {
        target: InstId::EXIT_OK,
    });
    assert!(b.finish(start).is_ok());
}

#[test]
fn test_dispatch_validation() {
    let mut b = ProgramBuilder::new();
    let mut index = [0u8; 257];
    index[usize::from(b'a')] = 1;
    let table = b.dispatch(index, vec![InstId::EXIT_FAIL, InstId::EXIT_OK]);
    let start = b.emit(Op::Dispatch { table });
    let program = b.finish(start).unwrap_or_else(|e| panic!("{e}"));
    let table = program.dispatch(table);
    assert_eq!(table.target(Some(b'a')), InstId::EXIT_OK);
    assert_eq!(table.target(Some(b'b')), InstId::EXIT_FAIL);
    assert_eq!(table.target(None), InstId::EXIT_FAIL);

    let mut b = ProgramBuilder::new();
    let mut index = [0u8; 257];
    index[DispatchTable::EOF_SLOT] = 2;
    let table = b.dispatch(index, vec![InstId::EXIT_FAIL, InstId::EXIT_OK]);
    let start = b.emit(Op::Dispatch { table });
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::DispatchSlotOutOfRange {
            table,
            slot: 256,
            branch: 2,
            len: 2,
        })
    );
}

#[test]
fn test_dispatch_targets_patched() {
    let mut b = ProgramBuilder::new();
    let branch = b.label();
    let table = b.dispatch([0u8; 257], vec![b.target(branch)]);
    let start = b.emit(Op::Dispatch { table });
    b.bind(branch);
    let target = b.emit_to(Op::Succ, InstId::EXIT_OK);
    let program = b.finish(start).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(program.dispatch(table).targets, vec![target]);
}

#[test]
fn test_unknown_memo_point_rejected() {
    let mut b = ProgramBuilder::new();
    let start = b.emit_to(
        Op::Memo {
            memo: MemoId::new(0),
        },
        InstId::EXIT_OK,
    );
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::UnknownMemoPoint {
            at: start,
            memo: MemoId::new(0),
            count: 0,
        })
    );
}

#[test]
fn test_pools_deduplicate() {
    let mut b = ProgramBuilder::new();
    let digits = ByteSet::from_ranges(&[(b'0', b'9')]);
    assert_eq!(b.byte_set(digits), b.byte_set(digits));
    assert_ne!(b.byte_set(digits), b.byte_set(digits.negate()));
    assert_eq!(b.literal(b"let"), b.literal(b"let"));
    assert_ne!(b.literal(b"let"), b.literal(b"var"));
    let expr = b.intern("Expr");
    let m0 = b.memo_point(expr, true, false);
    let m1 = b.memo_point(expr, false, true);
    assert_eq!((m0.index(), m1.index()), (0, 1));
}

#[test]
fn test_unknown_literal_rejected() {
    let mut b = ProgramBuilder::new();
    let start = b.emit_to(
        Op::TReplace {
            value: LitId::new(7),
        },
        InstId::EXIT_OK,
    );
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::UnknownPoolEntry {
            at: start,
            pool: "literal",
        })
    );
}

#[test]
fn test_disassembly_listing() {
    let mut b = ProgramBuilder::new();
    let alt = b.label();
    let start = b.emit(Op::Alt {
        failure: b.target(alt),
    });
    let kw = b.literal(b"if");
    b.emit(Op::Match {
        pattern: Pattern::Str(kw),
        policy: Policy::Once,
    });
    b.emit_to(Op::Succ, InstId::EXIT_OK);
    b.bind(alt);
    let digits = b.byte_set(ByteSet::from_ranges(&[(b'0', b'9')]));
    b.emit_to(
        Op::Match {
            pattern: Pattern::Set(digits),
            policy: Policy::Repeat,
        },
        InstId::EXIT_OK,
    );
    let program = b.finish(start).unwrap_or_else(|e| panic!("{e}"));
    let listing = program.to_string();
    let lines: Vec<&str> = listing.lines().collect();
    assert_eq!(
        lines,
        vec![
            "L0    exit false",
            "L1    exit true",
            "L2    alt L5  ; start",
            "L3    str \"if\"",
            "L4    succ -> L1",
            "L5    rset [0-9] -> L1",
        ]
    );
}

#[test]
fn test_try_variants_agree_with_panicking_ones() {
    let mut b = ProgramBuilder::new();
    let skip = b.try_label().unwrap_or_else(|e| panic!("{e}"));
    let kw = b.try_literal(b"do").unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(b.literal(b"do"), kw);
    let name = b.try_intern("Block").unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(b.intern("Block"), name);
    let memo = b
        .try_memo_point(name, false, false)
        .unwrap_or_else(|e| panic!("{e}"));
    let start = b
        .try_emit(Op::Lookup {
            memo,
            skip: b.target(skip),
        })
        .unwrap_or_else(|e| panic!("{e}"));
    b.try_emit_to(
        Op::Match {
            pattern: Pattern::Str(kw),
            policy: Policy::Once,
        },
        b.target(skip),
    )
    .unwrap_or_else(|e| panic!("{e}"));
    b.bind(skip);
    b.try_emit_to(Op::Nop { name }, InstId::EXIT_OK)
        .unwrap_or_else(|e| panic!("{e}"));
    let program = b.finish(start).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(program.len(), 5);
    assert_eq!(program.memo_point(memo).label, name);
}

#[test]
fn test_exhausted_index_space_is_an_error() {
    assert_eq!(checked_index(3, "labels"), Ok(3));
    let full = PLACEHOLDER as usize;
    let err = checked_index(full, "labels").unwrap_err();
    assert_eq!(
        err,
        PoolError {
            pool: "labels",
            count: full,
            max: PLACEHOLDER - 1,
        }
    );
    assert_eq!(
        ProgramError::from(err).to_string(),
        format!("labels exceeded capacity: {full} entries, max is {}", PLACEHOLDER - 1)
    );
}

#[test]
fn test_memo_op_must_match_point_tree_mode() {
    let mut b = ProgramBuilder::new();
    let term = b.intern("Term");
    let label = b.intern("value");
    let pure = b.memo_point(term, false, false);
    let linking = b.memo_point(term, true, false);

    let start = b.emit_to(
        Op::TLookup {
            memo: pure,
            label,
            skip: InstId::EXIT_OK,
        },
        InstId::EXIT_OK,
    );
    assert_eq!(
        b.finish(start).err(),
        Some(ProgramError::MemoModeMismatch {
            at: start,
            op: "tlookup",
            memo: pure,
        })
    );

    let mut b = ProgramBuilder::new();
    let term = b.intern("Term");
    b.memo_point(term, false, false);
    b.memo_point(term, true, false);
    let start = b.emit_to(Op::Memo { memo: linking }, InstId::EXIT_OK);
    assert!(matches!(
        b.finish(start),
        Err(ProgramError::MemoModeMismatch { op: "memo", .. })
    ));

    // FailMemo records failures for either kind.
    let mut b = ProgramBuilder::new();
    let term = b.intern("Term");
    b.memo_point(term, false, false);
    b.memo_point(term, true, false);
    let start = b.emit_to(Op::FailMemo { memo: linking }, InstId::EXIT_FAIL);
    assert!(b.finish(start).is_ok());
}
