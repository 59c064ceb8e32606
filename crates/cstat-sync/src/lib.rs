// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod controller;
pub mod payload;
pub mod schema_migration;
pub mod surface;

pub use bridge::{
    ExternalSelection, SelectionBridge, SelectionOutcome, flags_to_bits, parse_external_selection,
    parse_widget_selection,
};
pub use config::{DEFAULT_MAX_BUFFERED_OPTIONS, OverflowPolicy, SelectionLinkPolicy, SyncConfig};
pub use controller::{
    DatasetResolver, Notification, PickedDataset, SyncController, SyncEvent, SyncState,
};
pub use payload::{HeatmapNode, HeatmapPayload};
pub use schema_migration::{
    CURRENT_SCHEMA_VERSION, MAX_FORWARD_COMPAT_SCHEMA_VERSION, SyncConfigWire, UnknownFields,
    validate_schema_version,
};
pub use surface::{DrainedSurface, GateCounters, SurfaceGate};

/// Selection sync namespace.
pub fn crate_name() -> &'static str {
    let _ = (cstat_core::crate_name(), cstat_stats::crate_name());
    "cstat-sync"
}
