// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::bridge::{ExternalSelection, SelectionBridge, SelectionOutcome};
use crate::payload::HeatmapPayload;
use crate::surface::{DrainedSurface, SurfaceGate};
use crate::{SelectionLinkPolicy, SyncConfig};
use cstat_core::{AggregationDiagnostics, ClusterPartition, CstatError, SourceHandle};
use cstat_stats::StatisticsAggregator;
use tracing::{debug, error, info, warn};

/// Binding state of a [`SyncController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Point source or partition missing.
    Unbound,
    /// Both bound; statistics may be stale.
    Bound,
    /// Statistics current for the bound pair.
    Ready,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unbound => "Unbound",
            Self::Bound => "Bound",
            Self::Ready => "Ready",
        }
    }
}

/// Inbound message from the host or the visualization surface.
#[derive(Clone, Debug)]
pub enum SyncEvent {
    BindPointSource {
        name: String,
        source: SourceHandle,
    },
    BindClusterPartition {
        name: String,
        partition: ClusterPartition,
    },
    ClearPointSource,
    ClearClusterPartition,
    UpstreamDataChanged,
    /// The bound partition was recomputed upstream.
    ClusterPartitionChanged {
        partition: ClusterPartition,
    },
    /// The host changed the cluster selection; ordinals are untrusted.
    UpstreamSelectionChanged {
        ordinals: Vec<u32>,
    },
    ExternalSelection(ExternalSelection),
    SourcePicked {
        name: String,
    },
    Highlight {
        ordinal: i64,
    },
    DatasetAdded {
        name: String,
    },
    SurfaceReady,
}

impl SyncEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BindPointSource { .. } => "bind_point_source",
            Self::BindClusterPartition { .. } => "bind_cluster_partition",
            Self::ClearPointSource => "clear_point_source",
            Self::ClearClusterPartition => "clear_cluster_partition",
            Self::UpstreamDataChanged => "upstream_data_changed",
            Self::ClusterPartitionChanged { .. } => "cluster_partition_changed",
            Self::UpstreamSelectionChanged { .. } => "upstream_selection_changed",
            Self::ExternalSelection(_) => "external_selection",
            Self::SourcePicked { .. } => "source_picked",
            Self::Highlight { .. } => "highlight",
            Self::DatasetAdded { .. } => "dataset_added",
            Self::SurfaceReady => "surface_ready",
        }
    }
}

/// Outbound message to the visualization surface or the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Refreshed statistics.
    Payload(HeatmapPayload),
    /// Dense selection flags, one per cluster ordinal.
    SelectionRender(Vec<bool>),
    /// For the host to propagate onto the bound cluster dataset.
    SelectionChanged {
        partition_name: String,
        ordinals: Vec<u32>,
        /// Union of the selected clusters' point indices under
        /// [`SelectionLinkPolicy::FlattenToPoints`].
        point_indices: Option<Vec<u32>>,
    },
    Highlight(Vec<bool>),
    DataOption(String),
}

/// Dataset a picked name resolves to.
#[derive(Clone, Debug)]
pub enum PickedDataset {
    Points(SourceHandle),
    Clusters(ClusterPartition),
}

/// Name lookup in the host's dataset registry.
pub trait DatasetResolver {
    fn resolve(&self, name: &str) -> Option<PickedDataset>;
}

#[derive(Debug)]
struct Binding<T> {
    name: String,
    value: T,
    version: u64,
}

/// Event-driven owner of one point source and one cluster partition.
///
/// Every binding carries a version; the controller is `Ready` only when the
/// last successful aggregation ran against the currently bound versions.
pub struct SyncController {
    config: SyncConfig,
    aggregator: StatisticsAggregator,
    points: Option<Binding<SourceHandle>>,
    clusters: Option<Binding<ClusterPartition>>,
    next_version: u64,
    ready_for: Option<(u64, u64)>,
    gate: SurfaceGate,
    resolver: Option<Box<dyn DatasetResolver>>,
    last_diagnostics: Option<AggregationDiagnostics>,
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("state", &self.state())
            .field("points", &self.points)
            .field("clusters", &self.clusters.as_ref().map(|b| &b.name))
            .field("gate", &self.gate)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl SyncController {
    pub fn new(config: SyncConfig) -> Result<Self, CstatError> {
        config.validate()?;
        let gate = if config.wait_for_surface {
            SurfaceGate::new(config.max_buffered_options, config.option_overflow)
        } else {
            SurfaceGate::opened()
        };
        Ok(Self {
            config,
            aggregator: StatisticsAggregator::new(config.stats),
            points: None,
            clusters: None,
            next_version: 0,
            ready_for: None,
            gate,
            resolver: None,
            last_diagnostics: None,
        })
    }

    pub fn with_resolver(mut self, resolver: Box<dyn DatasetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        match (&self.points, &self.clusters) {
            (Some(points), Some(clusters)) => {
                if self.ready_for == Some((points.version, clusters.version)) {
                    SyncState::Ready
                } else {
                    SyncState::Bound
                }
            }
            _ => SyncState::Unbound,
        }
    }

    pub fn source(&self) -> Option<&SourceHandle> {
        self.points.as_ref().map(|binding| &binding.value)
    }

    pub fn source_name(&self) -> Option<&str> {
        self.points.as_ref().map(|binding| binding.name.as_str())
    }

    pub fn partition(&self) -> Option<&ClusterPartition> {
        self.clusters.as_ref().map(|binding| &binding.value)
    }

    pub fn partition_name(&self) -> Option<&str> {
        self.clusters.as_ref().map(|binding| binding.name.as_str())
    }

    pub fn gate(&self) -> &SurfaceGate {
        &self.gate
    }

    /// Diagnostics of the last successful aggregation pass.
    pub fn last_diagnostics(&self) -> Option<&AggregationDiagnostics> {
        self.last_diagnostics.as_ref()
    }

    /// Current payload, available only in `Ready`.
    pub fn payload(&self) -> Option<HeatmapPayload> {
        if self.state() != SyncState::Ready {
            return None;
        }
        let points = self.points.as_ref()?;
        let clusters = self.clusters.as_ref()?;
        Some(HeatmapPayload::build(
            &points.value.as_source(),
            &clusters.value,
        ))
    }

    /// Processes one event to completion and returns the notifications it
    /// produced, in emission order.
    ///
    /// An aggregation failure is returned as `Err`; no payload is emitted
    /// and the controller stays in `Bound`.
    pub fn handle(&mut self, event: SyncEvent) -> Result<Vec<Notification>, CstatError> {
        let kind = event.kind();
        let before = self.state();
        let result = self.dispatch(event);
        let after = self.state();
        if before != after {
            debug!(
                event = kind,
                from = before.as_str(),
                to = after.as_str(),
                "sync state transition"
            );
        }
        result
    }

    fn dispatch(&mut self, event: SyncEvent) -> Result<Vec<Notification>, CstatError> {
        match event {
            SyncEvent::BindPointSource { name, source } => {
                if !self.gate.is_open() {
                    debug!(name = %name, "deferring point bind until surface ready");
                    self.gate.defer_points(name, source);
                    return Ok(vec![]);
                }
                self.bind_points(name, source);
                Ok(vec![])
            }
            SyncEvent::BindClusterPartition { name, partition } => {
                if !self.gate.is_open() {
                    debug!(name = %name, "deferring cluster bind until surface ready");
                    self.gate.defer_clusters(name, partition);
                    return Ok(vec![]);
                }
                self.bind_clusters(name, partition);
                Ok(vec![])
            }
            SyncEvent::ClearPointSource => {
                self.gate.cancel_points();
                if let Some(binding) = self.points.take() {
                    info!(name = %binding.name, "point source cleared");
                }
                Ok(vec![])
            }
            SyncEvent::ClearClusterPartition => {
                self.gate.cancel_clusters();
                if let Some(binding) = self.clusters.take() {
                    info!(name = %binding.name, "cluster partition cleared");
                }
                Ok(vec![])
            }
            SyncEvent::UpstreamDataChanged => {
                if self.state() == SyncState::Unbound {
                    debug!("{}; ignoring upstream data change", CstatError::UnboundState);
                    return Ok(vec![]);
                }
                self.refresh()
            }
            SyncEvent::ClusterPartitionChanged { partition } => {
                if let Some(name) = self.gate.pending_cluster_name() {
                    let name = name.to_string();
                    debug!(name = %name, "replacing deferred cluster partition");
                    self.gate.defer_clusters(name, partition);
                    return Ok(vec![]);
                }
                let Some(binding) = self.clusters.as_ref() else {
                    debug!("no cluster partition bound; ignoring partition change");
                    return Ok(vec![]);
                };
                let name = binding.name.clone();
                self.bind_clusters(name, partition);
                if self.state() == SyncState::Unbound {
                    return Ok(vec![]);
                }
                self.refresh()
            }
            SyncEvent::UpstreamSelectionChanged { ordinals } => {
                let Some(partition) = self.bound_partition_mut() else {
                    debug!("{}; ignoring upstream selection", CstatError::UnboundState);
                    return Ok(vec![]);
                };
                let outcome = SelectionBridge::apply_external_selection(partition, ordinals)?;
                if !outcome.changed {
                    return Ok(vec![]);
                }
                Ok(vec![Notification::SelectionRender(
                    SelectionBridge::render_selection(partition),
                )])
            }
            SyncEvent::ExternalSelection(selection) => {
                let Some(partition) = self.bound_partition_mut() else {
                    debug!("{}; ignoring external selection", CstatError::UnboundState);
                    return Ok(vec![]);
                };
                let SelectionOutcome { changed, .. } =
                    SelectionBridge::apply(partition, &selection)?;
                if !changed {
                    return Ok(vec![]);
                }
                Ok(self.selection_notifications())
            }
            SyncEvent::SourcePicked { name } => self.pick(name),
            SyncEvent::Highlight { ordinal } => match self.partition() {
                Some(partition) => Ok(vec![Notification::Highlight(
                    SelectionBridge::render_highlight(partition, ordinal),
                )]),
                None => Ok(vec![]),
            },
            SyncEvent::DatasetAdded { name } => {
                if !self.gate.is_open() {
                    self.gate.buffer_option(name)?;
                    return Ok(vec![]);
                }
                Ok(vec![Notification::DataOption(name)])
            }
            SyncEvent::SurfaceReady => match self.gate.open() {
                Some(drained) => Ok(self.replay(drained)),
                None => Ok(vec![]),
            },
        }
    }

    /// The bound partition, only when both bindings are present.
    fn bound_partition_mut(&mut self) -> Option<&mut ClusterPartition> {
        self.points.as_ref()?;
        self.clusters.as_mut().map(|binding| &mut binding.value)
    }

    fn next_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn bind_points(&mut self, name: String, source: SourceHandle) {
        let version = self.next_version();
        info!(
            name = %name,
            n = source.num_points(),
            d = source.num_dimensions(),
            "point source bound"
        );
        self.points = Some(Binding {
            name,
            value: source,
            version,
        });
    }

    fn bind_clusters(&mut self, name: String, partition: ClusterPartition) {
        let version = self.next_version();
        info!(name = %name, clusters = partition.len(), "cluster partition bound");
        self.clusters = Some(Binding {
            name,
            value: partition,
            version,
        });
    }

    fn refresh(&mut self) -> Result<Vec<Notification>, CstatError> {
        let (Some(points), Some(clusters)) = (self.points.as_ref(), self.clusters.as_mut()) else {
            return Err(CstatError::UnboundState);
        };

        let source = points.value.as_source();
        let diagnostics = match self
            .aggregator
            .compute_statistics(&source, &mut clusters.value)
        {
            Ok(diagnostics) => diagnostics,
            Err(err) => {
                error!(
                    source = %points.name,
                    partition = %clusters.name,
                    code = err.code(),
                    error = %err,
                    "aggregation failed; payload refresh suppressed"
                );
                self.ready_for = None;
                return Err(err);
            }
        };

        let payload = HeatmapPayload::build(&source, &clusters.value);
        let render = SelectionBridge::render_selection(&clusters.value);
        self.ready_for = Some((points.version, clusters.version));
        self.last_diagnostics = Some(diagnostics);
        Ok(vec![
            Notification::Payload(payload),
            Notification::SelectionRender(render),
        ])
    }

    fn selection_notifications(&self) -> Vec<Notification> {
        let Some(binding) = self.clusters.as_ref() else {
            return vec![];
        };
        let partition = &binding.value;
        let point_indices = match self.config.selection_link {
            SelectionLinkPolicy::ClusterScoped => None,
            SelectionLinkPolicy::FlattenToPoints => Some(partition.selected_point_indices()),
        };
        vec![
            Notification::SelectionChanged {
                partition_name: binding.name.clone(),
                ordinals: partition.selection().ordinals(),
                point_indices,
            },
            Notification::SelectionRender(SelectionBridge::render_selection(partition)),
        ]
    }

    fn pick(&mut self, name: String) -> Result<Vec<Notification>, CstatError> {
        let Some(resolver) = self.resolver.as_ref() else {
            warn!(name = %name, "dataset picked but no resolver is installed");
            return Ok(vec![]);
        };
        match resolver.resolve(&name) {
            Some(PickedDataset::Points(source)) => self.bind_points(name, source),
            Some(PickedDataset::Clusters(partition)) => self.bind_clusters(name, partition),
            None => {
                warn!(name = %name, "picked dataset name did not resolve");
                return Ok(vec![]);
            }
        }
        if self.state() == SyncState::Unbound {
            return Ok(vec![]);
        }
        self.refresh()
    }

    fn replay(&mut self, drained: DrainedSurface) -> Vec<Notification> {
        let mut notifications = drained
            .options
            .into_iter()
            .map(Notification::DataOption)
            .collect::<Vec<_>>();

        let mut replayed = false;
        if let Some((name, source)) = drained.points {
            self.bind_points(name, source);
            replayed = true;
        }
        if let Some((name, partition)) = drained.clusters {
            self.bind_clusters(name, partition);
            replayed = true;
        }
        if replayed {
            info!(state = self.state().as_str(), "replayed deferred binds on surface ready");
        }

        if replayed && self.state() == SyncState::Bound {
            // Failures are logged by refresh; options still go out.
            if let Ok(refreshed) = self.refresh() {
                notifications.extend(refreshed);
            }
        }
        notifications
    }
}
