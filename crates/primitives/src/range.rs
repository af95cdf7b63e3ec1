#[cfg(test)]
#[path = "tests/range.rs"]
mod tests;

use core::fmt;
use core::iter::FusedIterator;

#[cfg(feature = "borsh")]
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
    Single,
}

/// Inclusive index range walked from `start` toward `finish`.
///
/// The direction is implied by the endpoints, so `(10, 0)` visits
/// `10, 9, ..., 0`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "borsh", derive(BorshSerialize, BorshDeserialize))]
pub struct SyncRange {
    pub start: u64,
    pub finish: u64,
}

impl SyncRange {
    #[must_use]
    pub const fn new(start: u64, finish: u64) -> Self {
        Self { start, finish }
    }

    #[must_use]
    pub const fn single(index: u64) -> Self {
        Self {
            start: index,
            finish: index,
        }
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        if self.start < self.finish {
            Direction::Ascending
        } else if self.start > self.finish {
            Direction::Descending
        } else {
            Direction::Single
        }
    }

    /// Number of indices covered, saturating at `u64::MAX`.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.start.abs_diff(self.finish).saturating_add(1)
    }

    /// A range always covers at least one index.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub const fn lowest(&self) -> u64 {
        if self.start < self.finish {
            self.start
        } else {
            self.finish
        }
    }

    #[must_use]
    pub const fn highest(&self) -> u64 {
        if self.start > self.finish {
            self.start
        } else {
            self.finish
        }
    }

    #[must_use]
    pub const fn contains(&self, index: u64) -> bool {
        index >= self.lowest() && index <= self.highest()
    }

    /// The index after `current` in walk order, or `None` once `current`
    /// has reached `finish`.
    #[must_use]
    pub const fn step(&self, current: u64) -> Option<u64> {
        if current == self.finish {
            return None;
        }

        match self.direction() {
            Direction::Ascending => current.checked_add(1),
            Direction::Descending => current.checked_sub(1),
            Direction::Single => None,
        }
    }

    /// Index halfway between the endpoints, rounded toward `start`.
    #[must_use]
    pub const fn midpoint(&self) -> u64 {
        match self.direction() {
            Direction::Ascending => self.start + (self.finish - self.start) / 2,
            Direction::Descending => self.start - (self.start - self.finish) / 2,
            Direction::Single => self.start,
        }
    }

    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self {
            start: self.finish,
            finish: self.start,
        }
    }

    #[must_use]
    pub const fn iter(&self) -> Indices {
        Indices {
            range: *self,
            next: Some(self.start),
        }
    }
}

impl IntoIterator for SyncRange {
    type Item = u64;
    type IntoIter = Indices;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for SyncRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} -> {}]", self.start, self.finish)
    }
}

/// Indices of a [`SyncRange`] in walk order.
#[derive(Clone, Debug)]
pub struct Indices {
    range: SyncRange,
    next: Option<u64>,
}

impl Iterator for Indices {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.range.step(current);
        Some(current)
    }
}

impl FusedIterator for Indices {}
