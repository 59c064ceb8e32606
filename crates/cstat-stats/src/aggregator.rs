// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{
    AggregationDiagnostics, Cluster, ClusterPartition, ClusterStats, CstatError, PointSource,
    PointView, ReproMode, population_moments,
};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, warn};

/// What a cluster with zero indices reports as its statistics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DegeneratePolicy {
    /// Mean and stddev are all zeros.
    #[default]
    ZeroFill,
    /// Mean and stddev are all NaN.
    Nan,
    /// The whole pass fails with `DegenerateCluster`.
    Reject,
}

impl DegeneratePolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ZeroFill => "ZeroFill",
            Self::Nan => "Nan",
            Self::Reject => "Reject",
        }
    }

    fn sentinel(self) -> f32 {
        match self {
            Self::Nan => f32::NAN,
            Self::ZeroFill | Self::Reject => 0.0,
        }
    }
}

/// Configuration for [`StatisticsAggregator`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsConfig {
    pub degenerate_policy: DegeneratePolicy,
    pub repro_mode: ReproMode,
}

/// Populates per-cluster population mean and standard deviation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatisticsAggregator {
    config: StatsConfig,
}

impl StatisticsAggregator {
    pub const fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Recomputes `mean`/`stddev` of every cluster in `partition` from `source`.
    ///
    /// All inputs are checked before any statistic is touched, and results are
    /// written only once the whole pass has succeeded: on error the partition
    /// keeps its previous statistics. Names, indices and selection are never
    /// modified.
    pub fn compute_statistics(
        &self,
        source: &PointSource<'_>,
        partition: &mut ClusterPartition,
    ) -> Result<AggregationDiagnostics, CstatError> {
        let started_at = Instant::now();
        source.validate()?;

        let n = source.num_points();
        let d = source.num_dimensions();
        partition.validate_indices(n)?;

        let degenerate = partition
            .clusters()
            .iter()
            .enumerate()
            .filter(|(_, cluster)| cluster.is_empty())
            .map(|(ordinal, _)| ordinal as u32)
            .collect::<Vec<_>>();

        let policy = self.config.degenerate_policy;
        if !degenerate.is_empty() {
            if policy == DegeneratePolicy::Reject {
                return Err(CstatError::degenerate_cluster(format!(
                    "clusters {degenerate:?} have no indices"
                )));
            }
            warn!(
                clusters = ?degenerate,
                policy = policy.as_str(),
                "empty clusters get sentinel statistics"
            );
        }

        debug!(
            n,
            d,
            clusters = partition.len(),
            capability = source.capability().as_str(),
            repro_mode = self.config.repro_mode.as_str(),
            "aggregating cluster statistics"
        );

        let sentinel = policy.sentinel();
        let mut stats = vec![
            ClusterStats {
                mean: vec![sentinel; d],
                stddev: vec![sentinel; d],
            };
            partition.len()
        ];

        let has_work = degenerate.len() < partition.len();
        let mut columns_extracted = 0usize;
        if has_work {
            match source {
                PointSource::Direct(view) => {
                    self.aggregate_direct(view, partition.clusters(), &mut stats)?;
                }
                PointSource::Proxy(_) => {
                    columns_extracted =
                        self.aggregate_columns(source, partition.clusters(), &mut stats)?;
                }
            }
        }

        partition.set_statistics(stats)?;

        let runtime_us = u64::try_from(started_at.elapsed().as_micros()).unwrap_or(u64::MAX);
        debug!(runtime_us, columns_extracted, "cluster statistics updated");

        Ok(AggregationDiagnostics {
            n,
            d,
            clusters: partition.len(),
            runtime_us: Some(runtime_us),
            capability: Some(source.capability()),
            columns_extracted,
            degenerate_clusters: degenerate,
            repro_mode: self.config.repro_mode,
            ..AggregationDiagnostics::default()
        })
    }

    fn aggregate_direct(
        &self,
        view: &PointView<'_>,
        clusters: &[Cluster],
        stats: &mut [ClusterStats],
    ) -> Result<(), CstatError> {
        for dim in 0..view.d {
            self.fold_dimension(dim, clusters, |point| view.value_at(point as usize, dim), stats)?;
        }
        Ok(())
    }

    /// Extracts each dimension once and reuses the column for every cluster.
    fn aggregate_columns(
        &self,
        source: &PointSource<'_>,
        clusters: &[Cluster],
        stats: &mut [ClusterStats],
    ) -> Result<usize, CstatError> {
        let mut extracted = 0usize;
        for dim in 0..source.num_dimensions() {
            let column = source.extract_dimension(dim)?;
            extracted += 1;
            // Columns are indexed by point alone; indices were validated against n.
            self.fold_dimension(dim, clusters, |point| Ok(column[point as usize]), stats)?;
        }
        Ok(extracted)
    }

    fn fold_dimension<F>(
        &self,
        dim: usize,
        clusters: &[Cluster],
        read: F,
        stats: &mut [ClusterStats],
    ) -> Result<(), CstatError>
    where
        F: Fn(u32) -> Result<f32, CstatError> + Sync,
    {
        let mode = self.config.repro_mode;
        let moments = |cluster: &Cluster| -> Result<Option<(f32, f32)>, CstatError> {
            let values = cluster
                .indices
                .iter()
                .map(|point| read(*point).map(f64::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(population_moments(&values, mode)
                .map(|(mean, variance)| (mean as f32, variance.sqrt() as f32)))
        };

        #[cfg(feature = "rayon")]
        let computed = clusters
            .par_iter()
            .map(moments)
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let computed = clusters
            .iter()
            .map(moments)
            .collect::<Result<Vec<_>, _>>()?;

        for (slot, value) in stats.iter_mut().zip(computed) {
            if let Some((mean, stddev)) = value {
                slot.mean[dim] = mean;
                slot.stddev[dim] = stddev;
            }
        }
        Ok(())
    }
}
