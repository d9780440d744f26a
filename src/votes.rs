// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Aggregation of every core's requirement on the shared L2 clock domain.

/// The L2 level each core currently needs, as indices into the plan's L2 table.
///
/// Cores which haven't voted yet count as needing the lowest level.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct L2Votes<const CORES: usize> {
    votes: [usize; CORES],
    level_count: usize,
}

impl<const CORES: usize> L2Votes<CORES> {
    /// Creates a vote array for an L2 table with `level_count` levels.
    pub const fn new(level_count: usize) -> Self {
        Self {
            votes: [0; CORES],
            level_count,
        }
    }

    /// Records the level needed by `core` and returns the level the L2 must now run at.
    ///
    /// Panics if `level` isn't in the L2 table or `core` is out of range; either means the
    /// frequency plan doesn't match the platform.
    pub fn cast_vote(&mut self, core: usize, level: usize) -> usize {
        assert!(
            level < self.level_count,
            "L2 vote {level} from CPU{core} out of range ({} levels)",
            self.level_count
        );
        self.votes[core] = level;
        self.effective()
    }

    /// Returns the highest level any core has voted for.
    pub fn effective(&self) -> usize {
        self.votes.iter().copied().max().unwrap_or_default()
    }

    /// Returns the level most recently voted for by `core`.
    pub fn vote(&self, core: usize) -> usize {
        self.votes[core]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_level_is_the_maximum_vote() {
        let mut votes = L2Votes::<3>::new(3);
        assert_eq!(votes.effective(), 0);

        assert_eq!(votes.cast_vote(0, 1), 1);
        assert_eq!(votes.cast_vote(1, 2), 2);
        assert_eq!(votes.cast_vote(2, 0), 2);

        assert_eq!(votes.cast_vote(1, 0), 1);
        assert_eq!(votes.vote(1), 0);
        assert_eq!(votes.effective(), 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn vote_beyond_table_panics() {
        let mut votes = L2Votes::<2>::new(4);
        votes.cast_vote(0, 4);
    }
}
