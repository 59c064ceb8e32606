// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::CstatError;
use cstat_stats::StatsConfig;
use serde::{Deserialize, Serialize};

/// Whether an outward selection change also carries the point-level union.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionLinkPolicy {
    #[default]
    ClusterScoped,
    FlattenToPoints,
}

impl SelectionLinkPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClusterScoped => "ClusterScoped",
            Self::FlattenToPoints => "FlattenToPoints",
        }
    }
}

/// Overflow behavior for the buffered dataset-option queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    DropNewest,
    Error,
}

impl OverflowPolicy {
    /// Stable user-facing policy name for diagnostics and messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropOldest => "DropOldest",
            Self::DropNewest => "DropNewest",
            Self::Error => "Error",
        }
    }
}

pub const DEFAULT_MAX_BUFFERED_OPTIONS: usize = 64;

/// Runtime configuration for [`crate::SyncController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub stats: StatsConfig,
    pub selection_link: SelectionLinkPolicy,
    /// Defer binds and dataset options until the surface reports ready.
    pub wait_for_surface: bool,
    pub max_buffered_options: usize,
    pub option_overflow: OverflowPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stats: StatsConfig::default(),
            selection_link: SelectionLinkPolicy::default(),
            wait_for_surface: false,
            max_buffered_options: DEFAULT_MAX_BUFFERED_OPTIONS,
            option_overflow: OverflowPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), CstatError> {
        if self.max_buffered_options == 0 {
            return Err(CstatError::invalid_input(
                "SyncConfig.max_buffered_options must be > 0; got 0",
            ));
        }
        Ok(())
    }
}
