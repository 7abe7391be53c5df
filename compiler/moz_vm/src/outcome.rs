//! Run results and caller-side diagnostics.

use thiserror::Error;

use crate::{ParseStats, Source};

/// Everything a finished run reports.
#[derive(Clone, Debug)]
pub struct ParseOutcome<T> {
    pub matched: bool,
    /// Present on success.
    pub tree: Option<T>,
    /// Cursor position at exit.
    pub position: usize,
    /// Furthest position the cursor reached before any rollback.
    pub max_position: usize,
    pub stats: ParseStats,
    /// Copied from [`crate::ParserOptions::reject_unconsumed`].
    pub reject_unconsumed: bool,
}

/// Why a run is reported as a syntax error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// The grammar did not match.
    NoMatch,
    /// The grammar matched a prefix and input remains.
    Unconsumed,
}

/// A failed parse, located for the user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("syntax error at {line}:{column}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    /// Byte offset of the error.
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    fn at<S: Source + ?Sized>(kind: SyntaxErrorKind, position: usize, source: &S) -> Self {
        SyntaxError {
            kind,
            position,
            line: source.line_of(position),
            column: source.column_of(position),
        }
    }
}

impl<T> ParseOutcome<T> {
    /// Whether a successful match stopped before `len`.
    pub fn has_unconsumed(&self, len: usize) -> bool {
        self.matched && self.position != len
    }

    /// The tree, or a located syntax error.
    ///
    /// A failed match reports the furthest position reached. Leftover input
    /// is an error only when `reject_unconsumed` is set.
    pub fn into_result<S: Source + ?Sized>(self, source: &S) -> Result<T, SyntaxError> {
        if self.reject_unconsumed && self.has_unconsumed(source.len()) {
            return Err(SyntaxError::at(
                SyntaxErrorKind::Unconsumed,
                self.position,
                source,
            ));
        }
        match self.tree {
            Some(tree) if self.matched => Ok(tree),
            _ => Err(SyntaxError::at(
                SyntaxErrorKind::NoMatch,
                self.max_position,
                source,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ByteSource;

    fn outcome(matched: bool, position: usize, max_position: usize) -> ParseOutcome<()> {
        ParseOutcome {
            matched,
            tree: matched.then_some(()),
            position,
            max_position,
            stats: ParseStats::default(),
            reject_unconsumed: false,
        }
    }

    fn strict(mut outcome: ParseOutcome<()>) -> ParseOutcome<()> {
        outcome.reject_unconsumed = true;
        outcome
    }

    #[test]
    fn test_no_match_reports_furthest_position() {
        let src = ByteSource::from("let x\n= ?");
        let err = outcome(false, 0, 8).into_result(&src).err();
        assert_eq!(
            err,
            Some(SyntaxError {
                kind: SyntaxErrorKind::NoMatch,
                position: 8,
                line: 2,
                column: 3,
            })
        );
        assert_eq!(
            err.map(|e| e.to_string()),
            Some("syntax error at 2:3".to_owned())
        );
    }

    #[test]
    fn test_unconsumed_only_when_rejected() {
        let src = ByteSource::from("123a");
        assert!(outcome(true, 3, 3).has_unconsumed(src.len()));
        assert!(!outcome(true, 4, 4).has_unconsumed(src.len()));
        assert!(!outcome(false, 0, 0).has_unconsumed(src.len()));
        assert_eq!(outcome(true, 3, 3).into_result(&src), Ok(()));
        let err = strict(outcome(true, 3, 3)).into_result(&src);
        assert_eq!(
            err.map_err(|e| (e.kind, e.position, e.to_string())),
            Err((SyntaxErrorKind::Unconsumed, 3, "syntax error at 1:4".to_owned()))
        );
    }
}
