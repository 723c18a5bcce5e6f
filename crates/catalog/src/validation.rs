// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::HashSet;

use tidewater_types::catalog::{TableDescriptor, TABLE_REPLICATION_FACTOR};

use crate::CatalogError;

/// Checks that a table descriptor is well-formed before anything is written for it.
pub fn validate_table_descriptor(descriptor: &TableDescriptor) -> Result<(), CatalogError> {
    let schema = descriptor.schema();
    if schema.columns().is_empty() {
        return Err(invalid("the schema must contain at least one column"));
    }

    let mut column_names = HashSet::new();
    for name in schema.column_names() {
        if name.is_empty() {
            return Err(invalid("column names must not be empty"));
        }
        if !column_names.insert(name) {
            return Err(invalid(format!("duplicate column '{name}'")));
        }
    }

    let primary_key = schema.primary_key().unwrap_or_default();
    check_columns("primary key", primary_key, &column_names)?;
    check_columns("bucket key", descriptor.bucket_keys(), &column_names)?;
    check_columns("partition key", descriptor.partition_keys(), &column_names)?;

    if descriptor.bucket_count() == Some(0) {
        return Err(invalid("the bucket count must be greater than 0"));
    }

    if !primary_key.is_empty() {
        let partition_keys = descriptor.partition_keys();
        if let Some(missing) = partition_keys
            .iter()
            .find(|key| !primary_key.contains(key))
        {
            return Err(invalid(format!(
                "partition key '{missing}' must be part of the primary key"
            )));
        }

        let physical_primary_key: Vec<_> = primary_key
            .iter()
            .filter(|key| !partition_keys.contains(key))
            .collect();
        if let Some(key) = descriptor
            .bucket_keys()
            .iter()
            .find(|key| !physical_primary_key.contains(key))
        {
            return Err(invalid(format!(
                "bucket key '{key}' must be part of the primary key excluding partition keys"
            )));
        }
    }

    if let Some(replication_factor) = descriptor.replication_factor() {
        match replication_factor.parse::<u16>() {
            Ok(factor) if factor > 0 => {}
            _ => {
                return Err(invalid(format!(
                    "'{TABLE_REPLICATION_FACTOR}' must be a positive integer but was '{replication_factor}'"
                )))
            }
        }
    }

    Ok(())
}

fn check_columns(
    kind: &str,
    keys: &[String],
    column_names: &HashSet<&str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for key in keys {
        if !column_names.contains(key.as_str()) {
            return Err(invalid(format!(
                "{kind} column '{key}' does not exist in the schema"
            )));
        }
        if !seen.insert(key) {
            return Err(invalid(format!("duplicate {kind} column '{key}'")));
        }
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> CatalogError {
    CatalogError::InvalidTableDescriptor(reason.into())
}

#[cfg(test)]
mod tests {
    use tidewater_types::catalog::{DataType, Schema};

    use super::*;

    fn schema() -> Schema {
        Schema::builder()
            .column("id", DataType::BigInt)
            .column("dt", DataType::String)
            .column("value", DataType::Double)
            .primary_key(["id", "dt"])
            .build()
    }

    #[test]
    fn accepts_valid_descriptors() {
        let descriptor = TableDescriptor::builder()
            .schema(schema())
            .distributed_by(4, ["id"])
            .partitioned_by(["dt"])
            .build()
            .with_replication_factor(3);
        assert!(validate_table_descriptor(&descriptor).is_ok());
    }

    #[test]
    fn rejects_empty_schema() {
        let descriptor = TableDescriptor::builder().build();
        assert!(matches!(
            validate_table_descriptor(&descriptor),
            Err(CatalogError::InvalidTableDescriptor(_))
        ));
    }

    #[test]
    fn rejects_unknown_key_columns() {
        for descriptor in [
            TableDescriptor::builder()
                .schema(schema())
                .distributed_by(4, ["missing"])
                .build(),
            TableDescriptor::builder()
                .schema(schema())
                .partitioned_by(["missing"])
                .build(),
            TableDescriptor::builder()
                .schema(
                    Schema::builder()
                        .column("id", DataType::Int)
                        .primary_key(["other"])
                        .build(),
                )
                .build(),
        ] {
            assert!(matches!(
                validate_table_descriptor(&descriptor),
                Err(CatalogError::InvalidTableDescriptor(reason)) if reason.contains("does not exist")
            ));
        }
    }

    #[test]
    fn rejects_duplicate_columns() {
        let descriptor = TableDescriptor::builder()
            .schema(
                Schema::builder()
                    .column("a", DataType::Int)
                    .column("a", DataType::String)
                    .build(),
            )
            .build();
        assert!(validate_table_descriptor(&descriptor).is_err());
    }

    #[test]
    fn primary_key_tables_constrain_bucket_and_partition_keys() {
        let bucket_key_is_partition_key = TableDescriptor::builder()
            .schema(schema())
            .distributed_by(4, ["dt"])
            .partitioned_by(["dt"])
            .build();
        assert!(validate_table_descriptor(&bucket_key_is_partition_key).is_err());

        let partition_key_outside_primary_key = TableDescriptor::builder()
            .schema(schema())
            .partitioned_by(["value"])
            .build();
        assert!(validate_table_descriptor(&partition_key_outside_primary_key).is_err());
    }

    #[test]
    fn rejects_invalid_bucket_count_and_replication_factor() {
        let zero_buckets = TableDescriptor::builder()
            .schema(schema())
            .distributed_by(0, ["id"])
            .build();
        assert!(validate_table_descriptor(&zero_buckets).is_err());

        let zero_replicas = TableDescriptor::builder()
            .schema(schema())
            .build()
            .with_replication_factor(0);
        assert!(validate_table_descriptor(&zero_replicas).is_err());

        let garbage_replicas = TableDescriptor::builder()
            .schema(schema())
            .property(TABLE_REPLICATION_FACTOR, "three")
            .build();
        assert!(validate_table_descriptor(&garbage_replicas).is_err());
    }
}
