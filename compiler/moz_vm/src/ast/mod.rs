//! Lazy tree construction.
//!
//! - [`AstLog`]: revocable log of construction intents
//! - [`TreeFactory`]: builds caller-defined trees at commit time
//! - [`CommonTree`]: the default tree

mod log;
mod tree;

pub use log::{AstLog, AstMark};
pub use tree::{Children, CommonTree, CommonTreeFactory, TreeFactory};

#[cfg(test)]
mod tests;
