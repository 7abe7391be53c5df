//! Machine tests.
//!
//! Grammars are written as parsing expressions and compiled by `grammar`:
//! - `machine`: control flow, matching, dispatch, tree construction
//! - `symbols`: context-sensitive matching through the symbol table
//! - `memo`: packrat memoization, per-point statistics
//! - `properties`: randomized invariants and concurrent runs

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]


use moz_ir::Program;

use crate::{ByteSource, CommonTree, ParseOutcome, Parser, ParserOptions};

fn run_with(program: &Program, input: &str, options: ParserOptions) -> ParseOutcome<CommonTree> {
    Parser::with_options(program, options)
        .parse(&ByteSource::from(input))
        .unwrap_or_else(|e| panic!("{e}"))
}

fn run(program: &Program, input: &str) -> ParseOutcome<CommonTree> {
    run_with(program, input, ParserOptions::default())
}

/// The tree of a successful parse as an s-expression, `None` on failure.
fn sexpr(program: &Program, input: &str, outcome: &ParseOutcome<CommonTree>) -> Option<String> {
    outcome
        .tree
        .as_ref()
        .map(|tree| tree.sexpr(program.symbols(), &ByteSource::from(input)))
}

/// Parse and render in one step.
fn parse(program: &Program, input: &str) -> Option<String> {
    sexpr(program, input, &run(program, input))
}
