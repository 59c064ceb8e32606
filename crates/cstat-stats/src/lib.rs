// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod aggregator;

pub use aggregator::{DegeneratePolicy, StatisticsAggregator, StatsConfig};

/// Statistics namespace.
pub fn crate_name() -> &'static str {
    let _ = cstat_core::crate_name();
    "cstat-stats"
}
