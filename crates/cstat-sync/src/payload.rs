// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{ClusterPartition, CstatError, PointSource};
use serde::{Deserialize, Serialize};

/// One heatmap row: a cluster with its per-dimension statistics.
///
/// Non-finite statistics are carried as `None` and serialise as JSON `null`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeatmapNode {
    pub name: String,
    pub size: u32,
    pub expression: Vec<Option<f32>>,
    pub stddev: Vec<Option<f32>>,
}

/// Refresh payload consumed by the visualization surface.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPayload {
    pub nodes: Vec<HeatmapNode>,
    /// One name per dimension.
    pub names: Vec<String>,
}

fn finite_or_none(values: &[f32]) -> Vec<Option<f32>> {
    values
        .iter()
        .map(|value| value.is_finite().then_some(*value))
        .collect()
}

impl HeatmapPayload {
    /// Builds the payload from a partition whose statistics are current for
    /// `source`.
    pub fn build(source: &PointSource<'_>, partition: &ClusterPartition) -> Self {
        let nodes = partition
            .clusters()
            .iter()
            .enumerate()
            .map(|(ordinal, cluster)| HeatmapNode {
                name: if cluster.name.is_empty() {
                    format!("Cluster name {ordinal}")
                } else {
                    cluster.name.clone()
                },
                size: u32::try_from(cluster.len()).unwrap_or(u32::MAX),
                expression: finite_or_none(&cluster.mean),
                stddev: finite_or_none(&cluster.stddev),
            })
            .collect();

        Self {
            nodes,
            names: source.resolved_dimension_names(),
        }
    }

    pub fn to_json(&self) -> Result<String, CstatError> {
        serde_json::to_string(self).map_err(|err| {
            CstatError::invalid_input(format!("failed to serialize heatmap payload: {err}"))
        })
    }
}
