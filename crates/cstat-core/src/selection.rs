// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::BTreeSet;

/// Set of selected cluster ordinals, validated against a partition size.
///
/// Every member is `< universe`. The only constructors filter their input,
/// so an instance can never hold an out-of-range ordinal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ordinals: BTreeSet<u32>,
    universe: usize,
}

impl SelectionSet {
    pub fn empty(universe: usize) -> Self {
        Self {
            ordinals: BTreeSet::new(),
            universe,
        }
    }

    /// Keeps the in-range ordinals and returns the dropped ones alongside.
    pub fn from_untrusted(
        ordinals: impl IntoIterator<Item = u32>,
        universe: usize,
    ) -> (Self, Vec<u32>) {
        let mut kept = BTreeSet::new();
        let mut dropped = Vec::new();
        for ordinal in ordinals {
            if (ordinal as usize) < universe {
                kept.insert(ordinal);
            } else {
                dropped.push(ordinal);
            }
        }
        (
            Self {
                ordinals: kept,
                universe,
            },
            dropped,
        )
    }

    /// Builds a selection from a dense flag list.
    ///
    /// Flags past `universe` are ignored and counted as dropped when set;
    /// a short list leaves the missing ordinals unselected.
    pub fn from_flags(flags: &[bool], universe: usize) -> (Self, usize) {
        let mut kept = BTreeSet::new();
        let mut dropped = 0usize;
        for (ordinal, flag) in flags.iter().copied().enumerate() {
            if !flag {
                continue;
            }
            match u32::try_from(ordinal) {
                Ok(value) if ordinal < universe => {
                    kept.insert(value);
                }
                _ => dropped += 1,
            }
        }
        (
            Self {
                ordinals: kept,
                universe,
            },
            dropped,
        )
    }

    pub fn universe(&self) -> usize {
        self.universe
    }

    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    pub fn contains(&self, ordinal: u32) -> bool {
        self.ordinals.contains(&ordinal)
    }

    /// Ordinals in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ordinals.iter().copied()
    }

    pub fn ordinals(&self) -> Vec<u32> {
        self.iter().collect()
    }

    /// Dense projection: one flag per ordinal in `0..universe`.
    pub fn to_flags(&self) -> Vec<bool> {
        let mut flags = vec![false; self.universe];
        for ordinal in &self.ordinals {
            flags[*ordinal as usize] = true;
        }
        flags
    }
}
