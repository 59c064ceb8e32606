// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// How cluster moments are accumulated. Every mode folds values relative to
/// the first member of the cluster.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReproMode {
    /// Two passes, both Kahan-compensated.
    Strict,
    /// Two passes over plain `f64` sums.
    #[default]
    Balanced,
    /// One pass over sum and sum of squares; loses precision when the spread
    /// is small next to the values.
    Fast,
}

impl ReproMode {
    pub const ALL: [Self; 3] = [Self::Strict, Self::Balanced, Self::Fast];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Balanced => "balanced",
            Self::Fast => "fast",
        }
    }
}
