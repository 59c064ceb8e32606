// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::OverflowPolicy;
use cstat_core::{ClusterPartition, CstatError, SourceHandle};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Counters for work deferred until the surface is ready.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GateCounters {
    pub deferred_binds: u64,
    pub replaced_binds: u64,
    pub cancelled_binds: u64,
    pub buffered_options: u64,
    pub dropped_oldest: u64,
    pub dropped_newest: u64,
    pub overflow_errors: u64,
}

/// Everything the gate held back, released once.
#[derive(Debug, Default)]
pub struct DrainedSurface {
    pub options: Vec<String>,
    pub points: Option<(String, SourceHandle)>,
    pub clusters: Option<(String, ClusterPartition)>,
}

/// Holds bind requests and dataset options until the rendering surface
/// signals that it has loaded.
///
/// At most one bind is pending per slot. The gate opens exactly once.
#[derive(Debug)]
pub struct SurfaceGate {
    open: bool,
    pending_points: Option<(String, SourceHandle)>,
    pending_clusters: Option<(String, ClusterPartition)>,
    options: VecDeque<String>,
    max_options: usize,
    on_overflow: OverflowPolicy,
    counters: GateCounters,
}

impl SurfaceGate {
    pub fn new(max_options: usize, on_overflow: OverflowPolicy) -> Self {
        Self {
            open: false,
            pending_points: None,
            pending_clusters: None,
            options: VecDeque::new(),
            max_options,
            on_overflow,
            counters: GateCounters::default(),
        }
    }

    /// A gate that never defers anything.
    pub fn opened() -> Self {
        let mut gate = Self::new(1, OverflowPolicy::default());
        gate.open = true;
        gate
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn counters(&self) -> &GateCounters {
        &self.counters
    }

    pub fn has_pending_binds(&self) -> bool {
        self.pending_points.is_some() || self.pending_clusters.is_some()
    }

    /// Name of the cluster bind held until the surface is ready.
    pub fn pending_cluster_name(&self) -> Option<&str> {
        self.pending_clusters.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn pending_options(&self) -> usize {
        self.options.len()
    }

    pub fn defer_points(&mut self, name: String, source: SourceHandle) {
        self.counters.deferred_binds += 1;
        if let Some((previous, _)) = self.pending_points.replace((name, source)) {
            self.counters.replaced_binds += 1;
            debug!(replaced = %previous, "pending point bind replaced before surface ready");
        }
    }

    pub fn defer_clusters(&mut self, name: String, partition: ClusterPartition) {
        self.counters.deferred_binds += 1;
        if let Some((previous, _)) = self.pending_clusters.replace((name, partition)) {
            self.counters.replaced_binds += 1;
            debug!(replaced = %previous, "pending cluster bind replaced before surface ready");
        }
    }

    /// Cancels a pending point bind. Returns whether one was pending.
    pub fn cancel_points(&mut self) -> bool {
        let cancelled = self.pending_points.take().is_some();
        if cancelled {
            self.counters.cancelled_binds += 1;
        }
        cancelled
    }

    pub fn cancel_clusters(&mut self) -> bool {
        let cancelled = self.pending_clusters.take().is_some();
        if cancelled {
            self.counters.cancelled_binds += 1;
        }
        cancelled
    }

    pub fn buffer_option(&mut self, name: String) -> Result<(), CstatError> {
        if self.options.len() >= self.max_options {
            match self.on_overflow {
                OverflowPolicy::DropOldest => {
                    if let Some(dropped) = self.options.pop_front() {
                        self.counters.dropped_oldest += 1;
                        warn!(dropped = %dropped, "option buffer full; dropping oldest");
                    }
                }
                OverflowPolicy::DropNewest => {
                    self.counters.dropped_newest += 1;
                    warn!(dropped = %name, "option buffer full; dropping newest");
                    return Ok(());
                }
                OverflowPolicy::Error => {
                    self.counters.overflow_errors += 1;
                    return Err(CstatError::out_of_range(format!(
                        "dataset option buffer full (max_buffered_options={}, policy={})",
                        self.max_options,
                        self.on_overflow.as_str()
                    )));
                }
            }
        }
        self.counters.buffered_options += 1;
        self.options.push_back(name);
        Ok(())
    }

    /// Opens the gate and hands back everything it held. Returns `None` when
    /// the gate is already open.
    pub fn open(&mut self) -> Option<DrainedSurface> {
        if self.open {
            return None;
        }
        self.open = true;
        Some(DrainedSurface {
            options: self.options.drain(..).collect(),
            points: self.pending_points.take(),
            clusters: self.pending_clusters.take(),
        })
    }
}
