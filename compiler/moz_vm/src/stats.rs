//! Diagnostic counters for one parse run.
//!
//! Nothing here influences parsing; the counters only describe how much
//! backtracking and memoization a run did.

/// Hit/miss counters of one memo point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoPointStats {
    pub hits: u64,
    pub fail_hits: u64,
    pub misses: u64,
    /// Sum of consumed lengths over successful hits.
    pub hit_length: u64,
    pub max_length: usize,
}

impl MemoPointStats {
    pub(crate) fn hit(&mut self, consumed: usize) {
        self.hits += 1;
        self.hit_length += consumed as u64;
        self.max_length = self.max_length.max(consumed);
    }

    pub(crate) fn fail_hit(&mut self) {
        self.fail_hits += 1;
    }

    pub(crate) fn miss(&mut self) {
        self.misses += 1;
    }

    /// Lookups answered from the table, failures included.
    pub fn lookups(&self) -> u64 {
        self.hits + self.fail_hits + self.misses
    }

    /// Share of lookups that hit a successful entry.
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.lookups())
    }

    /// Share of lookups that hit a recorded failure.
    pub fn fail_hit_ratio(&self) -> f64 {
        ratio(self.fail_hits, self.lookups())
    }

    /// Mean bytes skipped per successful hit.
    pub fn mean_length(&self) -> f64 {
        ratio(self.hit_length, self.hits)
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "ratios are diagnostic, exactness beyond 2^52 is irrelevant"
)]
fn ratio(n: u64, d: u64) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

/// Counters for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Failures that unwound to a choice point.
    pub failures: u64,
    /// Failures that moved the cursor backwards.
    pub backtracks: u64,
    /// Total bytes given back by backtracking.
    pub backtrack_length: u64,
    /// Furthest single backtrack, measured from the furthest position reached.
    pub longest_backtrack: usize,
    pub memo_stored: u64,
    pub memo_used: u64,
    pub memo_invalidated: u64,
    /// Indexed by memo id.
    pub memo_points: Vec<MemoPointStats>,
}

impl ParseStats {
    pub(crate) fn with_memo_points(points: usize) -> Self {
        ParseStats {
            memo_points: vec![MemoPointStats::default(); points],
            ..Self::default()
        }
    }

    /// Record a rollback from `current` to `saved`, with `head` the furthest
    /// position reached so far.
    pub(crate) fn backtrack(&mut self, saved: usize, current: usize, head: usize) {
        self.failures += 1;
        if current > saved {
            self.backtracks += 1;
            self.backtrack_length += (current - saved) as u64;
            self.longest_backtrack = self.longest_backtrack.max(head.max(current) - saved);
        }
    }
}
