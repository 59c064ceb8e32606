// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CstatError;
use crate::selection::SelectionSet;

/// Named subset of a point collection with derived per-dimension statistics.
///
/// `mean` and `stddev` are empty (or stale) until the first aggregation pass.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cluster {
    pub name: String,
    /// Point indices, in upstream order. Duplicates are kept as given.
    pub indices: Vec<u32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mean: Vec<f32>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stddev: Vec<f32>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            indices,
            mean: vec![],
            stddev: vec![],
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Statistics for one cluster, produced by an aggregation pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterStats {
    pub mean: Vec<f32>,
    pub stddev: Vec<f32>,
}

/// Ordered clusters plus the current cluster-level selection.
///
/// A cluster's position is its ordinal. The cluster count is fixed for the
/// lifetime of a partition, which keeps the selection valid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterPartition {
    clusters: Vec<Cluster>,
    selection: SelectionSet,
}

impl ClusterPartition {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        let selection = SelectionSet::empty(clusters.len());
        Self {
            clusters,
            selection,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, ordinal: u32) -> Option<&Cluster> {
        self.clusters.get(ordinal as usize)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Replaces the selection with one validated against this partition.
    pub fn replace_selection(&mut self, selection: SelectionSet) -> Result<(), CstatError> {
        if selection.universe() != self.clusters.len() {
            return Err(CstatError::out_of_range(format!(
                "selection validated for {} clusters applied to a partition of {}",
                selection.universe(),
                self.clusters.len()
            )));
        }
        self.selection = selection;
        Ok(())
    }

    /// Overwrites every cluster's statistics in place.
    ///
    /// `stats` must hold one entry per cluster, in ordinal order.
    pub fn set_statistics(&mut self, stats: Vec<ClusterStats>) -> Result<(), CstatError> {
        if stats.len() != self.clusters.len() {
            return Err(CstatError::invalid_input(format!(
                "statistics count mismatch: got {}, expected {}",
                stats.len(),
                self.clusters.len()
            )));
        }
        for (cluster, stat) in self.clusters.iter_mut().zip(stats) {
            cluster.mean = stat.mean;
            cluster.stddev = stat.stddev;
        }
        Ok(())
    }

    /// Checks that every point index is `< num_points`.
    pub fn validate_indices(&self, num_points: usize) -> Result<(), CstatError> {
        for (ordinal, cluster) in self.clusters.iter().enumerate() {
            if let Some(bad) = cluster
                .indices
                .iter()
                .copied()
                .find(|idx| *idx as usize >= num_points)
            {
                return Err(CstatError::out_of_range(format!(
                    "cluster {ordinal} ('{}') holds point index {bad} >= n={num_points}",
                    cluster.name
                )));
            }
        }
        Ok(())
    }

    /// True when every cluster carries `d`-length statistics.
    pub fn has_statistics(&self, d: usize) -> bool {
        self.clusters
            .iter()
            .all(|cluster| cluster.mean.len() == d && cluster.stddev.len() == d)
    }

    /// Sorted, deduplicated union of the selected clusters' point indices.
    pub fn selected_point_indices(&self) -> Vec<u32> {
        let mut points = self
            .selection
            .iter()
            .filter_map(|ordinal| self.cluster(ordinal))
            .flat_map(|cluster| cluster.indices.iter().copied())
            .collect::<Vec<_>>();
        points.sort_unstable();
        points.dedup();
        points
    }
}
