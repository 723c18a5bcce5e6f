// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod catalog;
mod watcher;

pub use catalog::*;
pub use watcher::*;

use serde::{Deserialize, Serialize};

use crate::errors::GenericError;

#[derive(Debug, thiserror::Error)]
pub enum InvalidConfigurationError {
    #[error("lake storage format must not be empty")]
    EmptyLakeFormat,
    #[error("lake default table options must not contain empty keys")]
    EmptyLakeOptionKey,
}

/// # Tidewater configuration file
///
/// Configuration of the catalog and the change watchers of a coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(default)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    #[serde(default)]
    pub catalog: CatalogOptions,
    #[serde(default)]
    pub watcher: WatcherOptions,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), InvalidConfigurationError> {
        if let Some(lake) = &self.catalog.lake {
            if lake.format.trim().is_empty() {
                return Err(InvalidConfigurationError::EmptyLakeFormat);
            }
            if lake
                .default_table_options
                .keys()
                .any(|key| key.trim().is_empty())
            {
                return Err(InvalidConfigurationError::EmptyLakeOptionKey);
            }
        }
        Ok(())
    }

    /// Dumps the configuration to a string
    pub fn dump(&self) -> Result<String, GenericError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
