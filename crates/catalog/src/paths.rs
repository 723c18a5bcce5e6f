// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Layout of the catalog in the coordination store.
//!
//! ```text
//! /metadata/databases/{db}                                    database registration
//! /metadata/databases/{db}/tables/{table}                     table registration
//! /metadata/databases/{db}/tables/{table}/schemas/{id}        schema
//! /metadata/databases/{db}/tables/{table}/partitions/{name}   table partition
//! /tabletservers/tables/{table_id}                            table assignment
//! /tabletservers/partitions/{partition_id}                    partition assignment
//! /counters/{table_id,partition_id,writer_id}                 id counters
//! ```

use bytestring::ByteString;

use tidewater_types::catalog::TablePath;
use tidewater_types::identifiers::{PartitionId, SchemaId, TableId};

pub const DATABASES: &str = "/metadata/databases";
pub const TABLE_ASSIGNMENTS: &str = "/tabletservers/tables";
pub const PARTITION_ASSIGNMENTS: &str = "/tabletservers/partitions";

pub const TABLE_ID_COUNTER: &str = "/counters/table_id";
pub const PARTITION_ID_COUNTER: &str = "/counters/partition_id";
pub const WRITER_ID_COUNTER: &str = "/counters/writer_id";

const TABLES: &str = "tables";
const SCHEMAS: &str = "schemas";
const PARTITIONS: &str = "partitions";

pub fn databases() -> ByteString {
    ByteString::from_static(DATABASES)
}

pub fn database(database_name: &str) -> ByteString {
    format!("{DATABASES}/{database_name}").into()
}

pub fn tables(database_name: &str) -> ByteString {
    format!("{DATABASES}/{database_name}/{TABLES}").into()
}

pub fn table(table_path: &TablePath) -> ByteString {
    format!(
        "{DATABASES}/{}/{TABLES}/{}",
        table_path.database_name(),
        table_path.table_name()
    )
    .into()
}

pub fn schemas(table_path: &TablePath) -> ByteString {
    format!("{}/{SCHEMAS}", table(table_path)).into()
}

pub fn schema(table_path: &TablePath, schema_id: SchemaId) -> ByteString {
    format!("{}/{SCHEMAS}/{schema_id}", table(table_path)).into()
}

pub fn partitions(table_path: &TablePath) -> ByteString {
    format!("{}/{PARTITIONS}", table(table_path)).into()
}

pub fn partition(table_path: &TablePath, partition_name: &str) -> ByteString {
    format!("{}/{PARTITIONS}/{partition_name}", table(table_path)).into()
}

pub fn table_assignment(table_id: TableId) -> ByteString {
    format!("{TABLE_ASSIGNMENTS}/{table_id}").into()
}

pub fn partition_assignment(partition_id: PartitionId) -> ByteString {
    format!("{PARTITION_ASSIGNMENTS}/{partition_id}").into()
}

/// Whether a change of the node at `changed_path` can add or remove a database or a table.
/// Changes below a table node, like schema or partition writes, cannot.
pub fn is_table_level(changed_path: &str) -> bool {
    match changed_path
        .strip_prefix(DATABASES)
        .and_then(|relative| relative.strip_prefix('/'))
    {
        // {db}, {db}/tables, or {db}/tables/{table}
        Some(relative) => relative.split('/').count() <= 3,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let table_path = TablePath::new("db", "orders");
        assert_eq!(tables("db"), "/metadata/databases/db/tables");
        assert_eq!(
            schema(&table_path, SchemaId::INITIAL),
            "/metadata/databases/db/tables/orders/schemas/1"
        );
        assert_eq!(
            partition(&table_path, "2024"),
            "/metadata/databases/db/tables/orders/partitions/2024"
        );
        assert_eq!(table_assignment(TableId::new(7)), "/tabletservers/tables/7");
        assert_eq!(
            partition_assignment(PartitionId::new(3)),
            "/tabletservers/partitions/3"
        );
    }

    #[test]
    fn table_level_changes() {
        let table_path = TablePath::new("db", "orders");
        assert!(is_table_level(DATABASES));
        assert!(is_table_level("/metadata"));
        assert!(is_table_level(&database("db")));
        assert!(is_table_level(&tables("db")));
        assert!(is_table_level(&table(&table_path)));

        assert!(!is_table_level(&schemas(&table_path)));
        assert!(!is_table_level(&schema(&table_path, SchemaId::INITIAL)));
        assert!(!is_table_level(&partition(&table_path, "2024")));
    }
}
