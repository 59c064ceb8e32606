// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{
    AggregationDiagnostics, Cluster, ClusterPartition, ComposedProxy, CstatError, PointBuffer,
    SourceHandle,
};
use cstat_sync::{
    ExternalSelection, HeatmapPayload, SelectionBridge, SyncConfig, SyncController, SyncEvent,
    SyncState, flags_to_bits,
};
use serde::Serialize;
use std::sync::Arc;

/// Result of one aggregation run driven through a [`SyncController`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsReport {
    pub payload: HeatmapPayload,
    /// Widget-form selection, one 0/1 entry per cluster.
    pub selection: Vec<u8>,
    pub diagnostics: AggregationDiagnostics,
}

/// Result of applying an untrusted selection to a partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectReport {
    pub selection: Vec<u8>,
    pub ordinals: Vec<u32>,
    pub dropped: usize,
}

/// One buffer binds directly; several are composed into a proxy source.
pub fn source_from_buffers(mut buffers: Vec<PointBuffer>) -> Result<SourceHandle, CstatError> {
    match buffers.len() {
        0 => Err(CstatError::invalid_source("at least one point buffer is required")),
        1 => Ok(SourceHandle::from(buffers.remove(0))),
        _ => {
            let members = buffers.into_iter().map(Arc::new).collect();
            Ok(SourceHandle::from(ComposedProxy::new(members)?))
        }
    }
}

/// Binds `source` and `clusters`, aggregates, then applies `selection`.
pub fn run_stats(
    source: SourceHandle,
    clusters: Vec<Cluster>,
    config: SyncConfig,
    selection: Option<ExternalSelection>,
) -> Result<StatsReport, CstatError> {
    let mut controller = SyncController::new(config)?;
    controller.handle(SyncEvent::BindPointSource {
        name: "points".to_string(),
        source,
    })?;
    controller.handle(SyncEvent::BindClusterPartition {
        name: "clusters".to_string(),
        partition: ClusterPartition::new(clusters),
    })?;
    controller.handle(SyncEvent::SurfaceReady)?;
    if controller.state() == SyncState::Bound {
        controller.handle(SyncEvent::UpstreamDataChanged)?;
    }
    if let Some(selection) = selection {
        controller.handle(SyncEvent::ExternalSelection(selection))?;
    }

    let payload = controller.payload().ok_or(CstatError::UnboundState)?;
    let partition = controller.partition().ok_or(CstatError::UnboundState)?;
    let diagnostics = controller
        .last_diagnostics()
        .cloned()
        .ok_or(CstatError::UnboundState)?;

    Ok(StatsReport {
        payload,
        selection: flags_to_bits(&SelectionBridge::render_selection(partition)),
        diagnostics,
    })
}

pub fn run_select(
    clusters: Vec<Cluster>,
    selection: &ExternalSelection,
) -> Result<SelectReport, CstatError> {
    let mut partition = ClusterPartition::new(clusters);
    let outcome = SelectionBridge::apply(&mut partition, selection)?;
    Ok(SelectReport {
        selection: flags_to_bits(&SelectionBridge::render_selection(&partition)),
        ordinals: partition.selection().ordinals(),
        dropped: outcome.dropped,
    })
}

/// CLI namespace.
pub fn crate_name() -> &'static str {
    let _ = (
        cstat_core::crate_name(),
        cstat_stats::crate_name(),
        cstat_sync::crate_name(),
    );
    "cstat-cli"
}

#[cfg(test)]
mod tests {
    use super::{run_select, run_stats, source_from_buffers};
    use cstat_core::{Cluster, PointBuffer, SourceCapability};
    use cstat_sync::{ExternalSelection, SyncConfig};

    fn buffer(values: Vec<f32>, n: usize) -> PointBuffer {
        PointBuffer::new(values, n, 2).expect("test buffer should be valid")
    }

    #[test]
    fn run_stats_reports_payload_selection_and_diagnostics() {
        let source = source_from_buffers(vec![buffer(
            vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0],
            4,
        )])
        .expect("single buffer binds directly");
        let report = run_stats(
            source,
            vec![Cluster::new("pair", vec![0, 1]), Cluster::new("rest", vec![2, 3])],
            SyncConfig::default(),
            Some(ExternalSelection::Ordinals(vec![1, 9])),
        )
        .expect("stats run should succeed");

        assert_eq!(report.payload.nodes[0].expression, vec![Some(1.5), Some(15.0)]);
        assert_eq!(report.payload.nodes[0].stddev, vec![Some(0.5), Some(5.0)]);
        assert_eq!(report.selection, vec![0, 1]);
        assert_eq!(
            report.diagnostics.capability,
            Some(SourceCapability::DirectIndexable)
        );
    }

    #[test]
    fn several_buffers_compose_into_a_proxy() {
        let source = source_from_buffers(vec![
            buffer(vec![1.0, 10.0, 2.0, 20.0], 2),
            buffer(vec![3.0, 30.0, 4.0, 40.0], 2),
        ])
        .expect("buffers share d");
        assert_eq!(source.num_points(), 4);

        let report = run_stats(
            source,
            vec![Cluster::new("all", vec![0, 1, 2, 3])],
            SyncConfig {
                wait_for_surface: true,
                ..SyncConfig::default()
            },
            None,
        )
        .expect("stats run should succeed");
        assert_eq!(report.payload.nodes[0].expression, vec![Some(2.5), Some(25.0)]);
        assert_eq!(report.diagnostics.columns_extracted, 2);
    }

    #[test]
    fn run_stats_surfaces_invalid_indices() {
        let source = source_from_buffers(vec![buffer(vec![1.0, 2.0], 1)])
            .expect("single buffer binds directly");
        let err = run_stats(
            source,
            vec![Cluster::new("bad", vec![3])],
            SyncConfig::default(),
            None,
        )
        .expect_err("index 3 is out of range");
        assert_eq!(err.code(), "out_of_range");
    }

    #[test]
    fn run_select_drops_invalid_ordinals() {
        let clusters = (0..3)
            .map(|i| Cluster::new(format!("c{i}"), vec![i]))
            .collect();
        let report = run_select(clusters, &ExternalSelection::Ordinals(vec![0, 2, 5]))
            .expect("select should succeed");
        assert_eq!(report.selection, vec![1, 0, 1]);
        assert_eq!(report.ordinals, vec![0, 2]);
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn empty_buffer_list_is_rejected() {
        let err = source_from_buffers(vec![]).expect_err("no buffers");
        assert!(err.to_string().contains("at least one"));
    }
}
