// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retries::RetryPolicy;

/// # Catalog options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct CatalogOptions {
    /// # Lake storage
    ///
    /// Lake integration of the cluster. Tables enabling the data lake inherit the default
    /// table options of the configured lake storage. Unset means no lake integration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(setter(strip_option))]
    pub lake: Option<LakeStorageOptions>,

    /// # Id allocation retry policy
    ///
    /// Backoff applied when concurrent allocations of table, partition, or writer ids collide
    /// on the same counter.
    pub id_allocation_retry_policy: RetryPolicy,

    /// # Schema registration retry policy
    ///
    /// Backoff applied when two schema registrations for the same table race for the same
    /// schema id.
    pub schema_registration_retry_policy: RetryPolicy,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            lake: None,
            id_allocation_retry_policy: RetryPolicy::exponential(
                Duration::from_millis(10),
                2.0,
                Some(10),
                Some(Duration::from_millis(500)),
            ),
            schema_registration_retry_policy: RetryPolicy::fixed_delay(
                Duration::from_millis(10),
                Some(5),
            ),
        }
    }
}

/// # Lake storage options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LakeStorageOptions {
    /// # Format
    ///
    /// Name of the lake format, for example `paimon`.
    pub format: String,

    /// # Default table options
    ///
    /// Properties added to every lake-enabled table unless the table defines them itself.
    #[serde(default)]
    pub default_table_options: BTreeMap<String, String>,
}

impl LakeStorageOptions {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            default_table_options: BTreeMap::default(),
        }
    }

    pub fn with_default_table_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_table_options.insert(key.into(), value.into());
        self
    }
}
