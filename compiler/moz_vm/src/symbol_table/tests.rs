use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;

const INDENT: Symbol = Symbol::NULL;

/// Distinct table handles; interning is deterministic so `table(n)` is stable.
fn table(n: u32) -> Symbol {
    let mut pool = moz_ir::SymbolPool::new();
    let mut sym = Symbol::NULL;
    for i in 0..=n {
        sym = pool.intern(&format!("T{i}"));
    }
    sym
}

#[test]
fn test_define_and_lookup() {
    let mut st = SymbolTable::new();
    assert_eq!(st.lookup(INDENT), None);
    st.define(INDENT, b"  ");
    assert_eq!(st.lookup(INDENT), Some(&b"  "[..]));
    assert!(st.exists(INDENT));
    assert!(st.matches(INDENT, b"  "));
    assert!(!st.matches(INDENT, b"    "));
}

#[test]
fn test_shadowing_and_contains() {
    let mut st = SymbolTable::new();
    st.define(INDENT, b"a");
    st.define(INDENT, b"b");
    assert_eq!(st.lookup(INDENT), Some(&b"b"[..]));
    assert!(st.contains(INDENT, b"a"));
    assert!(st.contains(INDENT, b"b"));
    assert!(!st.matches(INDENT, b"a"));
}

#[test]
fn test_tables_are_independent() {
    let (a, b) = (table(1), table(2));
    let mut st = SymbolTable::new();
    st.define(a, b"x");
    assert_eq!(st.lookup(b), None);
    st.define(b, b"y");
    assert_eq!(st.lookup(a), Some(&b"x"[..]));
    assert!(!st.contains(a, b"y"));
}

#[test]
fn test_mask_hides_outer_bindings() {
    let mut st = SymbolTable::new();
    st.define(INDENT, b"a");
    let mark = st.save();
    st.mask(INDENT);
    assert_eq!(st.lookup(INDENT), None);
    assert!(!st.exists(INDENT));
    assert!(!st.contains(INDENT, b"a"));
    st.define(INDENT, b"b");
    assert!(st.contains(INDENT, b"b"));
    assert!(!st.contains(INDENT, b"a"));
    st.restore(mark);
    assert_eq!(st.lookup(INDENT), Some(&b"a"[..]));
}

#[test]
fn test_restore_recovers_state() {
    let mut st = SymbolTable::new();
    assert_eq!(st.state(), 0);
    st.define(INDENT, b"a");
    let outer = st.state();
    let mark = st.save();
    st.define(INDENT, b"b");
    assert_ne!(st.state(), outer);
    assert_eq!(st.state_at(mark), outer);
    assert_eq!(st.state_at(SymbolMark(0)), 0);
    st.restore(mark);
    assert_eq!(st.state(), outer);
    st.restore(SymbolMark(0));
    assert_eq!(st.state(), 0);
    assert!(st.is_empty());
}

#[test]
fn test_redundant_binding_keeps_state() {
    let mut st = SymbolTable::new();
    st.define(INDENT, b"a");
    let before = st.state();
    st.define(INDENT, b"a");
    assert_eq!(st.state(), before);
    assert_eq!(st.len(), 2);

    // Masking a name with nothing visible changes no lookup either.
    let other = table(3);
    st.mask(other);
    assert_eq!(st.state(), before);
}

#[test]
fn test_fresh_state_after_restore() {
    let mut st = SymbolTable::new();
    let mark = st.save();
    st.define(INDENT, b"a");
    let first = st.state();
    st.restore(mark);
    st.define(INDENT, b"b");
    // A different binding never reuses a stale fingerprint.
    assert_ne!(st.state(), first);
}

#[derive(Clone, Debug)]
enum Action {
    Define(u32, Vec<u8>),
    Mask(u32),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..3u32, prop::collection::vec(b'a'..=b'c', 0..3)).prop_map(|(t, v)| Action::Define(t, v)),
        (0..3u32).prop_map(Action::Mask),
    ]
}

proptest! {
    #[test]
    fn restore_undoes_any_scope(
        before in prop::collection::vec(action(), 0..6),
        inside in prop::collection::vec(action(), 0..12),
    ) {
        let tables = [table(0), table(1), table(2)];
        let apply = |st: &mut SymbolTable, actions: &[Action]| {
            for a in actions {
                match a {
                    Action::Define(t, v) => st.define(tables[*t as usize], v),
                    Action::Mask(t) => st.mask(tables[*t as usize]),
                }
            }
        };
        let mut st = SymbolTable::new();
        apply(&mut st, &before);
        let snapshot: Vec<Option<Vec<u8>>> =
            tables.iter().map(|&t| st.lookup(t).map(<[u8]>::to_vec)).collect();
        let state = st.state();
        let len = st.len();

        let mark = st.save();
        apply(&mut st, &inside);
        prop_assert_eq!(st.state_at(mark), state);
        st.restore(mark);

        let after: Vec<Option<Vec<u8>>> =
            tables.iter().map(|&t| st.lookup(t).map(<[u8]>::to_vec)).collect();
        prop_assert_eq!(after, snapshot);
        prop_assert_eq!(st.state(), state);
        prop_assert_eq!(st.len(), len);
    }
}
