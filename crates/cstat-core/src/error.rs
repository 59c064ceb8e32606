// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Error taxonomy shared by every cstat crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CstatError {
    /// Malformed arguments or configuration.
    InvalidInput(String),
    /// Point index, dimension or cluster ordinal outside its valid bounds.
    OutOfRange(String),
    /// Source with zero dimensions, or a proxy whose extraction failed.
    InvalidSource(String),
    /// Cluster without indices under a policy that rejects it.
    DegenerateCluster(String),
    /// Access pattern the bound source cannot serve.
    NotSupported(String),
    /// Operation needing both a point source and a partition while unbound.
    UnboundState,
}

impl CstatError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    pub fn degenerate_cluster(msg: impl Into<String>) -> Self {
        Self::DegenerateCluster(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Stable machine-readable identifier, used in structured error output.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::OutOfRange(_) => "out_of_range",
            Self::InvalidSource(_) => "invalid_source",
            Self::DegenerateCluster(_) => "degenerate_cluster",
            Self::NotSupported(_) => "not_supported",
            Self::UnboundState => "unbound_state",
        }
    }
}

impl fmt::Display for CstatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::OutOfRange(msg) => write!(f, "out of range: {msg}"),
            Self::InvalidSource(msg) => write!(f, "invalid source: {msg}"),
            Self::DegenerateCluster(msg) => write!(f, "degenerate cluster: {msg}"),
            Self::NotSupported(msg) => write!(f, "not supported: {msg}"),
            Self::UnboundState => {
                write!(f, "operation requires a bound point source and cluster partition")
            }
        }
    }
}

impl std::error::Error for CstatError {}
