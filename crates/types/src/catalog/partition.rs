// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use super::{validate_name, InvalidNameError};

const PARTITION_NAME_SEPARATOR: &str = "$";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionSpecError {
    #[error("expected {expected} partition values but got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    InvalidValue(#[from] InvalidNameError),
}

/// Partition keys of a table paired with concrete values, e.g. `dt=2024-01-01`. The partition
/// name (values joined by `$`) is unique within its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPartitionSpec {
    partition_keys: Vec<String>,
    partition_values: Vec<String>,
}

impl ResolvedPartitionSpec {
    pub fn new(
        partition_keys: Vec<String>,
        partition_values: Vec<String>,
    ) -> Result<Self, PartitionSpecError> {
        if partition_keys.len() != partition_values.len() {
            return Err(PartitionSpecError::ArityMismatch {
                expected: partition_keys.len(),
                actual: partition_values.len(),
            });
        }
        for value in &partition_values {
            validate_name("partition value", value)?;
            if value.contains(PARTITION_NAME_SEPARATOR) {
                return Err(InvalidNameError::IllegalCharacter {
                    kind: "partition value",
                    name: value.clone(),
                    illegal: '$',
                }
                .into());
            }
        }
        Ok(Self {
            partition_keys,
            partition_values,
        })
    }

    /// Spec for a table with a single partition key.
    pub fn single(
        partition_key: impl Into<String>,
        partition_value: impl Into<String>,
    ) -> Result<Self, PartitionSpecError> {
        Self::new(vec![partition_key.into()], vec![partition_value.into()])
    }

    /// Reverses [`ResolvedPartitionSpec::partition_name`] given the table's partition keys.
    pub fn from_partition_name(
        partition_keys: Vec<String>,
        partition_name: &str,
    ) -> Result<Self, PartitionSpecError> {
        let values = partition_name
            .split(PARTITION_NAME_SEPARATOR)
            .map(str::to_owned)
            .collect();
        Self::new(partition_keys, values)
    }

    pub fn partition_keys(&self) -> &[String] {
        &self.partition_keys
    }

    pub fn partition_values(&self) -> &[String] {
        &self.partition_values
    }

    pub fn partition_name(&self) -> String {
        self.partition_values.join(PARTITION_NAME_SEPARATOR)
    }

    /// Human readable form used in error messages, e.g. `dt=2024-01-01/region=eu`.
    pub fn qualified_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResolvedPartitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self
            .partition_keys
            .iter()
            .zip(&self.partition_values)
            .enumerate()
        {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
