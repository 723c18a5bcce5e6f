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

use super::{Schema, TablePath};
use crate::identifiers::{SchemaId, TableId};
use crate::time::MillisSinceEpoch;

/// Property holding the replication factor of a table's buckets.
pub const TABLE_REPLICATION_FACTOR: &str = "table.replication.factor";
/// Property enabling the lake integration for a table.
pub const TABLE_DATALAKE_ENABLED: &str = "table.datalake.enabled";
/// Property enabling automatic partition creation.
pub const TABLE_AUTO_PARTITION_ENABLED: &str = "table.auto-partition.enabled";
/// Time unit used by automatic partition creation.
pub const TABLE_AUTO_PARTITION_TIME_UNIT: &str = "table.auto-partition.time-unit";

/// How the rows of a table are spread over buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TableDistribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bucket_keys: Vec<String>,
}

/// Everything a caller specifies when creating a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TableDescriptor {
    schema: Schema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    partition_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distribution: Option<TableDistribution>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    custom_properties: BTreeMap<String, String>,
}

impl TableDescriptor {
    pub fn builder() -> TableDescriptorBuilder {
        TableDescriptorBuilder::default()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn partition_keys(&self) -> &[String] {
        &self.partition_keys
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partition_keys.is_empty()
    }

    pub fn distribution(&self) -> Option<&TableDistribution> {
        self.distribution.as_ref()
    }

    pub fn bucket_count(&self) -> Option<u32> {
        self.distribution.as_ref().and_then(|d| d.bucket_count)
    }

    pub fn bucket_keys(&self) -> &[String] {
        self.distribution
            .as_ref()
            .map(|d| d.bucket_keys.as_slice())
            .unwrap_or_default()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn custom_properties(&self) -> &BTreeMap<String, String> {
        &self.custom_properties
    }

    /// Raw replication factor property, if set. Validation makes sure it parses.
    pub fn replication_factor(&self) -> Option<&str> {
        self.properties
            .get(TABLE_REPLICATION_FACTOR)
            .map(String::as_str)
    }

    pub fn is_datalake_enabled(&self) -> bool {
        self.properties
            .get(TABLE_DATALAKE_ENABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn with_replication_factor(mut self, replication_factor: u16) -> Self {
        self.properties.insert(
            TABLE_REPLICATION_FACTOR.to_owned(),
            replication_factor.to_string(),
        );
        self
    }

    /// Returns a copy of this descriptor using the given schema. Used when joining a table
    /// registration with the schema it points to.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds the given properties unless the table already defines them.
    pub fn with_default_properties<'a>(
        mut self,
        defaults: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Self {
        for (key, value) in defaults {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self
    }
}

#[derive(Debug, Default)]
pub struct TableDescriptorBuilder {
    inner: TableDescriptor,
}

impl TableDescriptorBuilder {
    pub fn schema(mut self, schema: Schema) -> Self {
        self.inner.schema = schema;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.inner.comment = Some(comment.into());
        self
    }

    pub fn distributed_by<I, S>(mut self, bucket_count: u32, bucket_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.distribution = Some(TableDistribution {
            bucket_count: Some(bucket_count),
            bucket_keys: bucket_keys.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn partitioned_by<I, S>(mut self, partition_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.partition_keys = partition_keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.properties.insert(key.into(), value.into());
        self
    }

    pub fn custom_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner
            .custom_properties
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> TableDescriptor {
        self.inner
    }
}

/// Resolved view of a table: its registration joined with the schema it points to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TableInfo {
    pub table_path: TablePath,
    pub table_id: TableId,
    pub schema_id: SchemaId,
    pub descriptor: TableDescriptor,
    pub created_time: MillisSinceEpoch,
    pub modified_time: MillisSinceEpoch,
}

impl TableInfo {
    pub fn is_partitioned(&self) -> bool {
        self.descriptor.is_partitioned()
    }

    pub fn schema(&self) -> &Schema {
        self.descriptor.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;

    #[test]
    fn builder_sets_distribution_and_partitioning() {
        let descriptor = TableDescriptor::builder()
            .schema(
                Schema::builder()
                    .column("a", DataType::Int)
                    .column("b", DataType::String)
                    .build(),
            )
            .distributed_by(3, ["a"])
            .partitioned_by(["b"])
            .property(TABLE_DATALAKE_ENABLED, "TRUE")
            .build()
            .with_replication_factor(3);

        assert!(descriptor.is_partitioned());
        assert_eq!(Some(3), descriptor.bucket_count());
        assert_eq!(["a".to_owned()], descriptor.bucket_keys());
        assert_eq!(Some("3"), descriptor.replication_factor());
        assert!(descriptor.is_datalake_enabled());
    }

    #[test]
    fn default_properties_never_override() {
        let descriptor = TableDescriptor::builder()
            .property("lake.format", "table-level")
            .build();
        let defaults = BTreeMap::from([
            ("lake.format".to_owned(), "cluster-level".to_owned()),
            ("lake.warehouse".to_owned(), "/warehouse".to_owned()),
        ]);

        let merged = descriptor.with_default_properties(&defaults);
        assert_eq!(
            Some(&"table-level".to_owned()),
            merged.properties().get("lake.format")
        );
        assert_eq!(
            Some(&"/warehouse".to_owned()),
            merged.properties().get("lake.warehouse")
        );
    }
}
