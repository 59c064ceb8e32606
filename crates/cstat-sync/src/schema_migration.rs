// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::SyncConfig;
use cstat_core::CstatError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current schema version written by config adapters.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
/// Maximum additive forward-compatible schema version accepted by readers.
pub const MAX_FORWARD_COMPAT_SCHEMA_VERSION: u32 = 2;

pub type UnknownFields = Map<String, Value>;

/// Validates whether an artifact schema version is currently readable.
pub fn validate_schema_version(schema_version: u32, artifact: &str) -> Result<(), CstatError> {
    if (CURRENT_SCHEMA_VERSION..=MAX_FORWARD_COMPAT_SCHEMA_VERSION).contains(&schema_version) {
        return Ok(());
    }

    Err(CstatError::invalid_input(format!(
        "{artifact} schema_version={schema_version} is unsupported; supported versions are {CURRENT_SCHEMA_VERSION}..={MAX_FORWARD_COMPAT_SCHEMA_VERSION}"
    )))
}

/// Wire format for versioned sync config payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncConfigWire {
    pub schema_version: u32,
    #[serde(flatten)]
    pub config: SyncConfig,
    #[serde(default, flatten)]
    pub unknown_fields: UnknownFields,
}

impl SyncConfigWire {
    pub fn from_runtime(config: SyncConfig) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            config,
            unknown_fields: UnknownFields::new(),
        }
    }

    pub fn into_runtime_parts(self) -> Result<(SyncConfig, UnknownFields), CstatError> {
        validate_schema_version(self.schema_version, "SyncConfig")?;
        self.config.validate()?;
        Ok((self.config, self.unknown_fields))
    }

    pub fn to_runtime(self) -> Result<SyncConfig, CstatError> {
        let (config, _) = self.into_runtime_parts()?;
        Ok(config)
    }
}
