//! Per-run parser configuration.
//!
//! Options are plain data, set in code or parsed from an option string such as
//! `"memo=exact window=32 -tree +unconsumed"`:
//!
//! - `memo=disabled|elastic|exact`: memo table strategy
//! - `window=N`: elastic slots per memo point, at most
//!   [`ParserOptions::MAX_WINDOW`]
//! - `slots=N`: exact elastic slot count, at most [`ParserOptions::MAX_SLOTS`]
//! - `+tree` / `-tree` (or `tree=true|false`): build trees or only recognize
//! - `+unconsumed` / `-unconsumed`: reject input left over after a match

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How the packrat memo table stores entries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoStrategy {
    /// Never memoize.
    Disabled,
    /// Bounded array of `window * points + 1` slots, overwritten on collision.
    #[default]
    Elastic,
    /// Unbounded table keeping every entry for the whole run.
    Exact,
}

impl MemoStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoStrategy::Disabled => "disabled",
            MemoStrategy::Elastic => "elastic",
            MemoStrategy::Exact => "exact",
        }
    }
}

impl fmt::Display for MemoStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoStrategy {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" | "off" | "none" => Ok(MemoStrategy::Disabled),
            "elastic" => Ok(MemoStrategy::Elastic),
            "exact" | "packrat" => Ok(MemoStrategy::Exact),
            _ => Err(OptionError::InvalidValue {
                option: "memo".to_owned(),
                value: s.to_owned(),
            }),
        }
    }
}

/// A malformed option string.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown parser option `{0}`")]
    Unknown(String),

    #[error("invalid value `{value}` for parser option `{option}`")]
    InvalidValue { option: String, value: String },

    #[error("parser option `{0}` needs a value")]
    MissingValue(String),
}

/// Settings for one parse run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserOptions {
    pub memo: MemoStrategy,
    /// Elastic slots per memo point; 0 disables memoization.
    pub window: usize,
    /// Elastic slot count replacing `window * points + 1`; 0 disables
    /// memoization.
    pub slots: Option<usize>,
    /// When `false`, tree instructions log nothing and a successful run yields
    /// one untagged node spanning the match.
    pub tree_construction: bool,
    /// When `true`, a match that stops before end of input is a failure in
    /// [`crate::ParseOutcome::into_result`].
    pub reject_unconsumed: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            memo: MemoStrategy::Elastic,
            window: 64,
            slots: None,
            tree_construction: true,
            reject_unconsumed: false,
        }
    }
}

impl ParserOptions {
    /// Largest `window` the option parser accepts.
    pub const MAX_WINDOW: usize = 1 << 16;

    /// Upper bound on elastic table slots, however they are sized.
    pub const MAX_SLOTS: usize = 1 << 20;

    /// Recognition only, no tree construction.
    #[must_use]
    pub fn recognizer() -> Self {
        ParserOptions {
            tree_construction: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_memo(mut self, memo: MemoStrategy) -> Self {
        self.memo = memo;
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    #[must_use]
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = Some(slots);
        self
    }

    /// Apply one option token: `name=value`, `+name` or `-name`.
    pub fn set_option(&mut self, token: &str) -> Result<(), OptionError> {
        let (name, value) = if let Some(name) = token.strip_prefix('+') {
            (name, Some("true"))
        } else if let Some(name) = token.strip_prefix('-') {
            (name, Some("false"))
        } else if let Some((name, value)) = token.split_once('=') {
            (name, Some(value))
        } else {
            (token, None)
        };

        let invalid = |value: &str| OptionError::InvalidValue {
            option: name.to_owned(),
            value: value.to_owned(),
        };
        let bounded = |value: Option<&str>, max: usize| -> Result<usize, OptionError> {
            let value = value.ok_or_else(|| OptionError::MissingValue(name.to_owned()))?;
            match value.parse::<usize>() {
                Ok(n) if n <= max => Ok(n),
                _ => Err(invalid(value)),
            }
        };
        let flag = |value: Option<&str>| match value {
            Some("true" | "on" | "yes") => Ok(true),
            Some("false" | "off" | "no") => Ok(false),
            Some(other) => Err(invalid(other)),
            None => Err(OptionError::MissingValue(name.to_owned())),
        };

        match name {
            "memo" => {
                let value = value.ok_or_else(|| OptionError::MissingValue(name.to_owned()))?;
                self.memo = value.parse()?;
            }
            "window" => self.window = bounded(value, Self::MAX_WINDOW)?,
            "slots" => self.slots = Some(bounded(value, Self::MAX_SLOTS)?),
            "tree" => self.tree_construction = flag(value)?,
            "unconsumed" => self.reject_unconsumed = flag(value)?,
            _ => return Err(OptionError::Unknown(name.to_owned())),
        }
        Ok(())
    }
}

impl FromStr for ParserOptions {
    type Err = OptionError;

    /// Parse whitespace-separated option tokens over the defaults.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = ParserOptions::default();
        for token in s.split_whitespace() {
            options.set_option(token)?;
        }
        Ok(options)
    }
}
