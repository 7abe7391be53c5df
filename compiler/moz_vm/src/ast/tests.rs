#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use moz_ir::{Symbol, SymbolPool};

use super::*;
use crate::ByteSource;

struct Names {
    pool: SymbolPool,
    int: Symbol,
    add: Symbol,
    list: Symbol,
    left: Symbol,
}

fn names() -> Names {
    let mut pool = SymbolPool::new();
    let int = pool.intern("Int");
    let add = pool.intern("Add");
    let list = pool.intern("List");
    let left = pool.intern("left");
    Names {
        pool,
        int,
        add,
        list,
        left,
    }
}

/// Log a leaf `#tag` spanning `start..end` inside a committed child scope.
fn leaf(
    log: &mut AstLog<'_, CommonTree>,
    factory: &mut CommonTreeFactory,
    tag: Symbol,
    span: std::ops::Range<usize>,
) {
    let mark = log.mark();
    log.begin(span.start);
    log.capture(span.end);
    log.tag(tag);
    log.commit(mark, Symbol::NULL, factory);
}

#[test]
fn test_single_node() {
    let n = names();
    let src = ByteSource::from("123");
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    log.begin(0);
    log.capture(3);
    log.tag(n.int);
    let tree = log.parse_result(0..3, &mut f);
    assert_eq!(tree.sexpr(&n.pool, &src), "#Int'123'");
    assert_eq!(tree.span(), 0..3);
}

#[test]
fn test_linked_children_in_order() {
    let n = names();
    let src = ByteSource::from("1,2");
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    log.begin(0);
    leaf(&mut log, &mut f, n.int, 0..1);
    leaf(&mut log, &mut f, n.int, 2..3);
    log.capture(3);
    log.tag(n.list);
    let tree = log.parse_result(0..3, &mut f);
    assert_eq!(tree.sexpr(&n.pool, &src), "#List[#Int'1' #Int'2']");
}

#[test]
fn test_left_fold() {
    let n = names();
    let src = ByteSource::from("1+2+3");
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    log.begin(0);
    log.capture(1);
    log.tag(n.int);
    for (op, rhs) in [(1, 2..3), (3, 4..5)] {
        log.fold(op, n.left);
        leaf(&mut log, &mut f, n.int, rhs.clone());
        log.capture(rhs.end);
        log.tag(n.add);
    }
    let tree = log.parse_result(0..5, &mut f);
    assert_eq!(
        tree.sexpr(&n.pool, &src),
        "#Add[$left=#Add[$left=#Int'1' #Int'2'] #Int'3']"
    );
}

#[test]
fn test_replace_value() {
    let n = names();
    let src = ByteSource::from("0x10");
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    log.begin(0);
    log.capture(4);
    log.tag(n.int);
    log.replace(b"16");
    let tree = log.parse_result(0..4, &mut f);
    assert_eq!(tree.value(), Some(&b"16"[..]));
    assert_eq!(tree.text(&src), "16");
}

#[test]
fn test_push_pop_scope() {
    let n = names();
    let src = ByteSource::from("(1)");
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    log.begin(0);
    log.push();
    log.begin(1);
    log.capture(2);
    log.tag(n.int);
    log.pop(n.left);
    leaf(&mut log, &mut f, n.int, 1..2);
    log.capture(3);
    log.tag(n.list);
    let tree = log.parse_result(0..3, &mut f);
    assert_eq!(tree.sexpr(&n.pool, &src), "#List[$left=#Int'1' #Int'1']");
}

#[test]
fn test_abort_discards_tail() {
    let n = names();
    let src = ByteSource::from("12");
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    log.begin(0);
    let mark = log.mark();
    leaf(&mut log, &mut f, n.int, 0..1);
    log.tag(n.add);
    assert_eq!(log.len(), 3);
    log.abort(mark);
    assert_eq!(log.len(), 1);
    assert_eq!(log.free_len(), 3);
    log.capture(2);
    log.tag(n.int);
    // Appends reuse the recycled entries first.
    assert_eq!(log.free_len(), 1);
    let tree = log.parse_result(0..2, &mut f);
    assert_eq!(tree.sexpr(&n.pool, &src), "#Int'12'");
}

#[test]
fn test_commit_links_latest() {
    let n = names();
    let mut f = CommonTreeFactory;
    let mut log = AstLog::new();
    assert!(log.latest_linked().is_none());
    leaf(&mut log, &mut f, n.int, 0..1);
    assert_eq!(log.latest_linked().map(CommonTree::tag), Some(n.int));
    assert_eq!(log.len(), 1);
}

#[test]
fn test_empty_log_synthesizes_whole_span() {
    let n = names();
    let src = ByteSource::from("abc");
    let mut f = CommonTreeFactory;
    let mut log: AstLog<'_, CommonTree> = AstLog::new();
    let tree = log.parse_result(0..3, &mut f);
    assert_eq!(tree.tag(), Symbol::NULL);
    assert_eq!(tree.span(), 0..3);
    assert_eq!(tree.sexpr(&n.pool, &src), "#'abc'");
}

#[test]
fn test_disabled_log_records_nothing() {
    let n = names();
    let mut f = CommonTreeFactory;
    let mut log = AstLog::disabled();
    assert!(!log.is_enabled());
    assert!(AstLog::<CommonTree>::new().is_enabled());
    log.begin(0);
    leaf(&mut log, &mut f, n.int, 0..1);
    assert!(log.is_empty());
    assert!(log.latest_linked().is_none());
    let tree = log.parse_result(0..1, &mut f);
    assert_eq!(tree.tag(), Symbol::NULL);
}

#[derive(Clone, Debug)]
enum Intent {
    New,
    Capture,
    Tag,
    Link,
    Push,
    Pop,
}

fn intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        Just(Intent::New),
        Just(Intent::Capture),
        Just(Intent::Tag),
        Just(Intent::Link),
        Just(Intent::Push),
        Just(Intent::Pop),
    ]
}

fn apply(
    log: &mut AstLog<'_, CommonTree>,
    f: &mut CommonTreeFactory,
    tag: Symbol,
    intents: &[Intent],
) {
    for (pos, intent) in intents.iter().enumerate() {
        match intent {
            Intent::New => log.begin(pos),
            Intent::Capture => log.capture(pos),
            Intent::Tag => log.tag(tag),
            Intent::Link => leaf(log, f, tag, pos..pos + 1),
            Intent::Push => log.push(),
            Intent::Pop => log.pop(Symbol::NULL),
        }
    }
}

proptest! {
    #[test]
    fn abort_restores_length(
        prefix in prop::collection::vec(intent(), 0..8),
        first in prop::collection::vec(intent(), 0..16),
        second in prop::collection::vec(intent(), 0..16),
    ) {
        let n = names();
        let mut f = CommonTreeFactory;
        let mut log = AstLog::new();
        apply(&mut log, &mut f, n.int, &prefix);
        let mark = log.mark();
        let len = log.len();

        apply(&mut log, &mut f, n.int, &first);
        log.abort(mark);
        prop_assert_eq!(log.len(), len);
        let free = log.free_len();

        // Replaying runs entirely on recycled entries.
        apply(&mut log, &mut f, n.add, &first);
        log.abort(mark);
        prop_assert_eq!(log.len(), len);
        prop_assert_eq!(log.free_len(), free);

        apply(&mut log, &mut f, n.add, &second);
        log.abort(mark);
        prop_assert_eq!(log.len(), len);
        prop_assert!(log.free_len() >= free);
    }
}
