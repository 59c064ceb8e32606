// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::point_source::SourceCapability;
use crate::repro::ReproMode;

/// Diagnostics schema version for aggregation run metadata.
pub const DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured diagnostics captured from one aggregation pass.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationDiagnostics {
    pub n: usize,
    pub d: usize,
    pub clusters: usize,
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub runtime_us: Option<u64>,
    pub capability: Option<SourceCapability>,
    /// Columns materialised for column-extractable sources; at most `d`.
    pub columns_extracted: usize,
    /// Ordinals of clusters with no indices.
    pub degenerate_clusters: Vec<u32>,
    pub repro_mode: ReproMode,
    pub warnings: Vec<String>,
}

impl Default for AggregationDiagnostics {
    fn default() -> Self {
        Self {
            n: 0,
            d: 0,
            clusters: 0,
            schema_version: DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            runtime_us: None,
            capability: None,
            columns_extracted: 0,
            degenerate_clusters: vec![],
            repro_mode: ReproMode::Balanced,
            warnings: vec![],
        }
    }
}
