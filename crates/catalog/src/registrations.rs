// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Payloads of the catalog nodes in the coordination store.

use tidewater_types::catalog::{
    DatabaseDescriptor, DatabaseInfo, Schema, TableDescriptor, TableInfo, TablePath,
};
use tidewater_types::identifiers::{PartitionId, SchemaId, TableId};
use tidewater_types::json_storage_encode_decode;
use tidewater_types::time::MillisSinceEpoch;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatabaseRegistration {
    pub descriptor: DatabaseDescriptor,
    pub created_time: MillisSinceEpoch,
    pub modified_time: MillisSinceEpoch,
}

impl DatabaseRegistration {
    pub fn new(descriptor: DatabaseDescriptor) -> Self {
        let now = MillisSinceEpoch::now();
        Self {
            descriptor,
            created_time: now,
            modified_time: now,
        }
    }

    pub fn into_database_info(self, database_name: impl Into<String>) -> DatabaseInfo {
        DatabaseInfo {
            database_name: database_name.into(),
            descriptor: self.descriptor,
            created_time: self.created_time,
            modified_time: self.modified_time,
        }
    }
}

json_storage_encode_decode!(DatabaseRegistration);

/// Registration of a table. The columns live in the schema nodes below the table node; the
/// registration only points to the current one via `schema_id`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TableRegistration {
    pub table_id: TableId,
    pub schema_id: SchemaId,
    descriptor: TableDescriptor,
    pub created_time: MillisSinceEpoch,
    pub modified_time: MillisSinceEpoch,
}

impl TableRegistration {
    pub fn new(table_id: TableId, schema_id: SchemaId, descriptor: TableDescriptor) -> Self {
        let now = MillisSinceEpoch::now();
        Self {
            table_id,
            schema_id,
            descriptor: descriptor.with_schema(Schema::default()),
            created_time: now,
            modified_time: now,
        }
    }

    pub fn is_partitioned(&self) -> bool {
        self.descriptor.is_partitioned()
    }

    pub fn partition_keys(&self) -> &[String] {
        self.descriptor.partition_keys()
    }

    /// Joins the registration with the schema it points to.
    pub fn into_table_info(self, table_path: TablePath, schema: Schema) -> TableInfo {
        TableInfo {
            table_path,
            table_id: self.table_id,
            schema_id: self.schema_id,
            descriptor: self.descriptor.with_schema(schema),
            created_time: self.created_time,
            modified_time: self.modified_time,
        }
    }
}

json_storage_encode_decode!(TableRegistration);

/// Links a partition node to its table and its globally unique id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TablePartition {
    pub table_id: TableId,
    pub partition_id: PartitionId,
}

impl TablePartition {
    pub fn new(table_id: TableId, partition_id: PartitionId) -> Self {
        Self {
            table_id,
            partition_id,
        }
    }
}

json_storage_encode_decode!(TablePartition);
