// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tidewater_types::catalog::{PartitionAssignment, TableAssignment, TableInfo, TablePath};
use tidewater_types::identifiers::{PartitionId, TableId};

/// A table appeared in the catalog. Partitioned tables carry an empty assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableEvent {
    pub table_info: TableInfo,
    pub assignment: TableAssignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTableEvent {
    pub table_id: TableId,
    /// The table was partitioned, so its partitions are dropped along with it.
    pub is_partitioned_cascade: bool,
    /// Only the physical table state needs to be deleted, the catalog entry is already gone.
    pub is_physical_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePartitionEvent {
    pub table_path: TablePath,
    pub table_id: TableId,
    pub partition_id: PartitionId,
    pub partition_name: String,
    pub assignment: PartitionAssignment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPartitionEvent {
    pub table_id: TableId,
    pub partition_id: PartitionId,
    pub partition_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::From, derive_more::IsVariant)]
pub enum CoordinatorEvent {
    CreateTable(CreateTableEvent),
    DropTable(DropTableEvent),
    CreatePartition(CreatePartitionEvent),
    DropPartition(DropPartitionEvent),
}

impl CoordinatorEvent {
    /// Id of the table the event refers to.
    pub fn table_id(&self) -> TableId {
        match self {
            CoordinatorEvent::CreateTable(event) => event.table_info.table_id,
            CoordinatorEvent::DropTable(event) => event.table_id,
            CoordinatorEvent::CreatePartition(event) => event.table_id,
            CoordinatorEvent::DropPartition(event) => event.table_id,
        }
    }
}
