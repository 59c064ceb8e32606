// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Core shared types for cstat: point sources, clusters, selections and the
//! common error type.

pub mod cluster;
pub mod diagnostics;
pub mod error;
pub mod numeric;
pub mod point_source;
pub mod proxy;
pub mod repro;
pub mod selection;

pub use cluster::{Cluster, ClusterPartition, ClusterStats};
pub use diagnostics::{AggregationDiagnostics, DIAGNOSTICS_SCHEMA_VERSION};
pub use error::CstatError;
pub use numeric::{KahanSum, population_moments};
pub use point_source::{DTypeView, MemoryLayout, PointSource, PointView, SourceCapability};
pub use proxy::{ComposedProxy, PointBuffer, ProxySource, SourceHandle};
pub use repro::ReproMode;
pub use selection::SelectionSet;

/// Core shared types namespace.
pub fn crate_name() -> &'static str {
    "cstat-core"
}
