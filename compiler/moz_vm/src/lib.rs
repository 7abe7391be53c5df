//! Backtracking parsing machine.
//!
//! Runs a compiled [`moz_ir::Program`] over a byte [`Source`]:
//!
//! - [`Machine`]: one run's cursor, frame stack and instruction loop
//! - [`AstLog`]: revocable tree-construction log, materialized through a
//!   [`TreeFactory`] only for constructions that survive backtracking
//! - [`MemoTable`]: packrat cache of rule outcomes per position
//! - [`SymbolTable`]: scoped bindings for context-sensitive grammars
//!
//! A `Program` is immutable and shared; every run owns its mutable state, so
//! independent runs may proceed on different threads over the same program.
//!
//! # Tracing
//!
//! Runs are instrumented with `tracing`. Call [`init_tracing`] and set
//! `RUST_LOG=moz_vm=debug` for run summaries or `moz_vm=trace` for every
//! backtrack and memo hit.

mod ast;
mod machine;
mod memo;
mod options;
mod outcome;
mod source;
mod stack;
mod stats;
mod symbol_table;

use std::sync::Once;

use moz_ir::{InstId, Program};

pub use ast::{AstLog, AstMark, Children, CommonTree, CommonTreeFactory, TreeFactory};
pub use machine::{ExecError, Machine};
pub use memo::{MemoEntry, MemoTable};
pub use options::{MemoStrategy, OptionError, ParserOptions};
pub use outcome::{ParseOutcome, SyntaxError, SyntaxErrorKind};
pub use source::{ByteSource, Source};
pub use stats::{MemoPointStats, ParseStats};
pub use symbol_table::{SymbolMark, SymbolTable};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing subscriber for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Does nothing unless `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

/// Run `program` from `start` over `source`.
///
/// A non-matching input is a normal outcome (`matched == false`); `Err`
/// means the program violated the machine's stack discipline.
pub fn execute<S, F>(
    program: &Program,
    start: InstId,
    source: &S,
    factory: F,
    options: &ParserOptions,
) -> Result<ParseOutcome<F::Tree>, ExecError>
where
    S: Source + ?Sized,
    F: TreeFactory,
{
    let mut machine = Machine::new(program, source, factory, options);
    let matched = machine.run(start)?;
    Ok(machine.into_outcome(matched))
}

/// A program paired with the options it runs under.
///
/// Cheap to copy between threads; each call starts a fresh run.
#[derive(Clone, Debug)]
pub struct Parser<'p> {
    program: &'p Program,
    options: ParserOptions,
}

impl<'p> Parser<'p> {
    pub fn new(program: &'p Program) -> Self {
        Self::with_options(program, ParserOptions::default())
    }

    pub fn with_options(program: &'p Program, options: ParserOptions) -> Self {
        Parser { program, options }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse `source` into a [`CommonTree`].
    pub fn parse<S: Source + ?Sized>(
        &self,
        source: &S,
    ) -> Result<ParseOutcome<CommonTree>, ExecError> {
        self.parse_with(source, CommonTreeFactory)
    }

    /// Parse `source`, building trees with `factory`.
    pub fn parse_with<S, F>(
        &self,
        source: &S,
        factory: F,
    ) -> Result<ParseOutcome<F::Tree>, ExecError>
    where
        S: Source + ?Sized,
        F: TreeFactory,
    {
        execute(
            self.program,
            self.program.start(),
            source,
            factory,
            &self.options,
        )
    }

    /// Match `source` without building a tree.
    pub fn recognize<S: Source + ?Sized>(
        &self,
        source: &S,
    ) -> Result<ParseOutcome<CommonTree>, ExecError> {
        let options = ParserOptions {
            tree_construction: false,
            ..self.options.clone()
        };
        execute(
            self.program,
            self.program.start(),
            source,
            CommonTreeFactory,
            &options,
        )
    }
}

#[cfg(test)]
mod tests;
