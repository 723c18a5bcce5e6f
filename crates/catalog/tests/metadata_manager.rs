// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use bytestring::ByteString;
use googletest::prelude::*;
use parking_lot::Mutex;
use test_log::test;
use tokio::sync::mpsc;

use tidewater_catalog::{CatalogError, MetadataManager};
use tidewater_core::{
    ChildrenChanged, CoordinationStore, CoordinationStoreClient, InMemoryCoordinationStore,
    Precondition, ReadError, VersionedValue, WatchHandle, WriteError,
};
use tidewater_types::catalog::{
    DataType, DatabaseDescriptor, PartitionAssignment, ResolvedPartitionSpec, Schema,
    TableAssignment, TableDescriptor, TablePath,
};
use tidewater_types::config::CatalogOptions;
use tidewater_types::identifiers::{PartitionId, SchemaId, ServerId, TableId};
use tidewater_types::Version;

const DATABASE: &str = "warehouse";

fn schema() -> Schema {
    Schema::builder()
        .column("a", DataType::Int)
        .column("b", DataType::String)
        .column("dt", DataType::String)
        .primary_key(["a", "dt"])
        .build()
}

fn log_table() -> TableDescriptor {
    TableDescriptor::builder()
        .schema(
            Schema::builder()
                .column("a", DataType::Int)
                .column("b", DataType::String)
                .build(),
        )
        .distributed_by(3, ["a"])
        .comment("log table")
        .build()
        .with_replication_factor(1)
}

fn partitioned_table() -> TableDescriptor {
    TableDescriptor::builder()
        .schema(schema())
        .distributed_by(3, ["a"])
        .partitioned_by(["dt"])
        .build()
}

fn assignment() -> TableAssignment {
    TableAssignment::round_robin(3, 1, &[ServerId::new(0), ServerId::new(1)]).unwrap()
}

fn manager(client: &CoordinationStoreClient) -> MetadataManager {
    MetadataManager::new(client.clone(), &CatalogOptions::default())
}

async fn manager_with_database() -> MetadataManager {
    let manager = manager(&CoordinationStoreClient::new_in_memory());
    manager
        .create_database(DATABASE, DatabaseDescriptor::default(), false)
        .await
        .unwrap();
    manager
}

#[test(tokio::test)]
async fn database_lifecycle() -> googletest::Result<()> {
    let manager = manager(&CoordinationStoreClient::new_in_memory());
    let descriptor = DatabaseDescriptor::default().with_comment("analytics");

    manager
        .create_database(DATABASE, descriptor.clone(), false)
        .await?;
    manager
        .create_database("other", DatabaseDescriptor::default(), false)
        .await?;

    let database = manager.get_database(DATABASE).await?;
    assert_that!(database.database_name, eq(DATABASE));
    assert_that!(database.descriptor, eq(descriptor));
    assert!(manager.database_exists(DATABASE).await?);
    assert_that!(
        manager.list_databases().await?,
        unordered_elements_are![eq(DATABASE), eq("other")]
    );

    // idempotent creation keeps the first registration
    manager
        .create_database(DATABASE, DatabaseDescriptor::default(), true)
        .await?;
    assert_that!(
        manager.get_database(DATABASE).await?.created_time,
        eq(database.created_time)
    );
    assert!(matches!(
        manager
            .create_database(DATABASE, DatabaseDescriptor::default(), false)
            .await,
        Err(CatalogError::DatabaseAlreadyExists(_))
    ));

    manager.drop_database(DATABASE, false, false).await?;
    assert!(!manager.database_exists(DATABASE).await?);
    assert!(matches!(
        manager.get_database(DATABASE).await,
        Err(CatalogError::DatabaseNotExist(_))
    ));
    assert!(matches!(
        manager.drop_database(DATABASE, false, false).await,
        Err(CatalogError::DatabaseNotExist(_))
    ));
    manager.drop_database(DATABASE, true, false).await?;

    Ok(())
}

#[test(tokio::test)]
async fn non_empty_databases_require_cascade() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    manager
        .create_table(&TablePath::new(DATABASE, "t"), log_table(), None, false)
        .await?;

    assert!(matches!(
        manager.drop_database(DATABASE, false, false).await,
        Err(CatalogError::DatabaseNotEmpty(_))
    ));
    assert!(manager.database_exists(DATABASE).await?);

    manager.drop_database(DATABASE, false, true).await?;
    assert!(!manager.database_exists(DATABASE).await?);
    assert!(!manager.table_exists(&TablePath::new(DATABASE, "t")).await?);

    Ok(())
}

#[test(tokio::test)]
async fn create_then_read_table() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "log_table");

    let table_id = manager
        .create_table(&table_path, log_table(), Some(assignment()), false)
        .await?;
    assert_that!(table_id, some(eq(TableId::new(0))));

    let table = manager.get_table(&table_path).await?;
    assert_that!(table.table_id, eq(TableId::new(0)));
    assert_that!(table.table_path, eq(table_path.clone()));
    assert_that!(table.schema_id, eq(SchemaId::INITIAL));
    assert_that!(table.descriptor, eq(log_table()));

    let latest = manager.get_latest_schema(&table_path).await?;
    assert_that!(latest.schema_id, eq(table.schema_id));
    assert_that!(latest.schema, eq(log_table().schema().clone()));
    assert_that!(
        manager
            .get_schema_by_id(&table_path, SchemaId::INITIAL)
            .await?
            .schema,
        eq(log_table().schema().clone())
    );
    assert_that!(
        manager.repository().get_table_assignment(TableId::new(0)).await?,
        some(eq(assignment()))
    );

    assert!(manager.table_exists(&table_path).await?);
    assert_that!(
        manager.list_tables(DATABASE).await?,
        elements_are![eq("log_table")]
    );

    Ok(())
}

#[test(tokio::test)]
async fn missing_entities_are_reported() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "missing");

    assert!(matches!(
        manager.get_table(&table_path).await,
        Err(CatalogError::TableNotExist(_))
    ));
    assert!(matches!(
        manager.get_latest_schema(&table_path).await,
        Err(CatalogError::SchemaNotExist { schema_id: None, .. })
    ));
    assert!(matches!(
        manager.list_tables("missing").await,
        Err(CatalogError::DatabaseNotExist(_))
    ));
    assert!(matches!(
        manager
            .create_table(&TablePath::new("missing", "t"), log_table(), None, false)
            .await,
        Err(CatalogError::DatabaseNotExist(_))
    ));

    let existing = TablePath::new(DATABASE, "t");
    manager
        .create_table(&existing, log_table(), None, false)
        .await?;
    let err = manager
        .get_schema_by_id(&existing, SchemaId::new(7))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_that!(
        err.to_string(),
        eq("schema '7' of table 'warehouse.t' does not exist")
    );

    Ok(())
}

#[test(tokio::test)]
async fn table_creation_and_drop_are_existence_gated() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "t");

    manager
        .create_table(&table_path, log_table(), None, false)
        .await?;
    let before = manager.get_table(&table_path).await?;

    assert_that!(
        manager
            .create_table(&table_path, partitioned_table(), None, true)
            .await?,
        none()
    );
    assert_that!(manager.get_table(&table_path).await?, eq(before));
    assert!(matches!(
        manager
            .create_table(&table_path, log_table(), None, false)
            .await,
        Err(CatalogError::TableAlreadyExists(_))
    ));

    manager.drop_table(&table_path, false).await?;
    assert!(!manager.table_exists(&table_path).await?);
    assert!(matches!(
        manager.drop_table(&table_path, false).await,
        Err(CatalogError::TableNotExist(_))
    ));
    manager.drop_table(&table_path, true).await?;

    Ok(())
}

#[test(tokio::test)]
async fn invalid_descriptors_do_not_consume_ids() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let invalid = TableDescriptor::builder()
        .schema(schema())
        .distributed_by(3, ["unknown"])
        .build();

    let first = manager
        .create_table(&TablePath::new(DATABASE, "t1"), log_table(), None, false)
        .await?;
    assert!(matches!(
        manager
            .create_table(&TablePath::new(DATABASE, "bad"), invalid, None, false)
            .await,
        Err(CatalogError::InvalidTableDescriptor(_))
    ));
    let second = manager
        .create_table(&TablePath::new(DATABASE, "t2"), log_table(), None, false)
        .await?;

    assert_that!(first, some(eq(TableId::new(0))));
    assert_that!(second, some(eq(TableId::new(1))));
    assert!(!manager.table_exists(&TablePath::new(DATABASE, "bad")).await?);

    Ok(())
}

#[test(tokio::test)]
async fn ids_increase_across_manager_restarts() -> googletest::Result<()> {
    let client = CoordinationStoreClient::new_in_memory();
    let manager = manager(&client);
    manager
        .create_database(DATABASE, DatabaseDescriptor::default(), false)
        .await?;

    let mut table_ids = Vec::new();
    let mut writer_ids = Vec::new();
    for i in 0..3 {
        let table_path = TablePath::new(DATABASE, format!("t{i}"));
        table_ids.push(
            manager
                .create_table(&table_path, log_table(), None, false)
                .await?
                .unwrap(),
        );
        writer_ids.push(manager.init_writer_id().await?);
        manager.drop_table(&table_path, false).await?;
    }

    // a new manager on the same store continues the sequences
    let restarted = MetadataManager::new(client.clone(), &CatalogOptions::default());
    table_ids.push(
        restarted
            .create_table(&TablePath::new(DATABASE, "t0"), log_table(), None, false)
            .await?
            .unwrap(),
    );
    writer_ids.push(restarted.init_writer_id().await?);

    assert!(table_ids.windows(2).all(|w| w[0] < w[1]));
    assert!(writer_ids.windows(2).all(|w| w[0] < w[1]));
    assert_that!(table_ids.last().copied(), some(eq(TableId::new(3))));

    Ok(())
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_table_creation_has_one_winner() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "contended");

    let creations: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            let table_path = table_path.clone();
            tokio::spawn(async move {
                manager
                    .create_table(&table_path, log_table(), Some(assignment()), false)
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    let mut losers = 0;
    for creation in creations {
        match creation.await? {
            Ok(Some(table_id)) => winners.push(table_id),
            Err(CatalogError::TableAlreadyExists(_)) => losers += 1,
            other => panic!("unexpected result of concurrent creation: {other:?}"),
        }
    }

    assert_that!(winners.len(), eq(1));
    assert_that!(losers, eq(3));
    let table = manager.get_table(&table_path).await?;
    assert_that!(table.table_id, eq(winners[0]));
    assert_that!(
        manager.repository().get_table_assignment(winners[0]).await?,
        some(eq(assignment()))
    );

    Ok(())
}

#[test(tokio::test)]
async fn partition_lifecycle() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "partitioned");
    let table_id = manager
        .create_table(&table_path, partitioned_table(), None, false)
        .await?
        .unwrap();
    let partition_assignment = PartitionAssignment::new(table_id, assignment());

    for value in ["2011", "2022"] {
        manager
            .create_partition(
                &table_path,
                table_id,
                partition_assignment.clone(),
                &ResolvedPartitionSpec::single("dt", value)?,
                false,
            )
            .await?;
    }

    let partitions = manager.list_partitions(&table_path).await?;
    assert_that!(
        partitions.keys().map(String::as_str).collect::<Vec<_>>(),
        elements_are![eq("2011"), eq("2022")]
    );
    assert_that!(
        partitions.values().copied().collect::<BTreeSet<_>>(),
        eq(BTreeSet::from([PartitionId::new(0), PartitionId::new(1)]))
    );
    assert_that!(
        manager
            .repository()
            .get_partition_assignment(partitions["2011"])
            .await?,
        some(eq(partition_assignment.clone()))
    );

    let spec_2011 = ResolvedPartitionSpec::single("dt", "2011")?;
    // idempotent creation does not allocate a new partition
    manager
        .create_partition(
            &table_path,
            table_id,
            partition_assignment.clone(),
            &spec_2011,
            true,
        )
        .await?;
    assert_that!(manager.list_partitions(&table_path).await?, eq(partitions.clone()));
    assert!(matches!(
        manager
            .create_partition(
                &table_path,
                table_id,
                partition_assignment.clone(),
                &spec_2011,
                false,
            )
            .await,
        Err(CatalogError::PartitionAlreadyExists { .. })
    ));

    manager
        .drop_partition(&table_path, &spec_2011, false)
        .await?;
    assert_that!(
        manager.get_partitions(&table_path).await?,
        elements_are![eq("2022")]
    );
    assert!(matches!(
        manager.drop_partition(&table_path, &spec_2011, false).await,
        Err(CatalogError::PartitionNotExist { .. })
    ));
    manager.drop_partition(&table_path, &spec_2011, true).await?;

    Ok(())
}

#[test(tokio::test)]
async fn list_partitions_requires_partitioned_table() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "log");
    manager
        .create_table(&table_path, log_table(), None, false)
        .await?;

    assert!(matches!(
        manager.list_partitions(&table_path).await,
        Err(CatalogError::TableNotPartitioned(_))
    ));
    assert!(matches!(
        manager
            .list_partitions(&TablePath::new(DATABASE, "missing"))
            .await,
        Err(CatalogError::TableNotExist(_))
    ));
    assert_that!(manager.get_partitions(&table_path).await?, empty());

    Ok(())
}

#[test(tokio::test)]
async fn complete_delete_is_idempotent() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "partitioned");
    let table_id = manager
        .create_table(&table_path, partitioned_table(), Some(assignment()), false)
        .await?
        .unwrap();
    manager
        .create_partition(
            &table_path,
            table_id,
            PartitionAssignment::new(table_id, assignment()),
            &ResolvedPartitionSpec::single("dt", "2024")?,
            false,
        )
        .await?;
    let partition_id = manager.list_partitions(&table_path).await?["2024"];

    manager.drop_table(&table_path, false).await?;
    // dropping only triggers deletion
    assert_that!(
        manager.repository().get_table_assignment(table_id).await?,
        some(anything())
    );

    for _ in 0..2 {
        manager.complete_delete_partition(partition_id).await?;
        manager.complete_delete_table(table_id).await?;
    }

    assert_that!(
        manager.repository().get_table_assignment(table_id).await?,
        none()
    );
    assert_that!(
        manager
            .repository()
            .get_partition_assignment(partition_id)
            .await?,
        none()
    );

    Ok(())
}

#[test(tokio::test)]
async fn names_are_validated_by_every_operation() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let table_path = TablePath::new(DATABASE, "t");
    manager
        .create_table(&table_path, log_table(), None, false)
        .await?;

    // would address the table node if joined into a store path
    let nested = format!("{DATABASE}/tables/t");
    assert!(matches!(
        manager.drop_database(&nested, false, true).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.get_database(&nested).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.database_exists(&nested).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.list_tables(&nested).await,
        Err(CatalogError::InvalidName(_))
    ));

    let invalid = TablePath::new(DATABASE, "t/partitions");
    assert!(matches!(
        manager.table_exists(&invalid).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.get_table(&invalid).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.get_latest_schema(&invalid).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.drop_table(&invalid, true).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.list_partitions(&invalid).await,
        Err(CatalogError::InvalidName(_))
    ));
    assert!(matches!(
        manager.get_partitions(&invalid).await,
        Err(CatalogError::InvalidName(_))
    ));

    assert!(manager.table_exists(&table_path).await?);
    Ok(())
}

#[test(tokio::test)]
async fn partitions_require_a_partitioned_table() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    let log = TablePath::new(DATABASE, "log");
    let log_id = manager
        .create_table(&log, log_table(), None, false)
        .await?
        .unwrap();
    let partitioned = TablePath::new(DATABASE, "partitioned");
    let partitioned_id = manager
        .create_table(&partitioned, partitioned_table(), None, false)
        .await?
        .unwrap();
    let spec = ResolvedPartitionSpec::single("dt", "2024")?;
    let create = |table_path: TablePath, table_id: TableId| {
        let manager = manager.clone();
        let spec = spec.clone();
        async move {
            manager
                .create_partition(
                    &table_path,
                    table_id,
                    PartitionAssignment::new(table_id, assignment()),
                    &spec,
                    false,
                )
                .await
        }
    };

    assert!(matches!(
        create(TablePath::new("ghost", "t"), TableId::new(7)).await,
        Err(CatalogError::TableNotExist(_))
    ));
    assert!(matches!(
        create(TablePath::new(DATABASE, "missing"), TableId::new(7)).await,
        Err(CatalogError::TableNotExist(_))
    ));
    assert!(matches!(
        create(log.clone(), log_id).await,
        Err(CatalogError::TableNotPartitioned(_))
    ));
    // the id of another table
    assert!(matches!(
        create(partitioned.clone(), log_id).await,
        Err(CatalogError::TableNotExist(_))
    ));

    // rejected partitions leave no nodes behind
    assert_that!(manager.list_databases().await?, elements_are![eq(DATABASE)]);
    assert!(!manager.database_exists("ghost").await?);
    manager
        .create_database("ghost", DatabaseDescriptor::default(), false)
        .await?;
    assert_that!(manager.list_tables(DATABASE).await?.len(), eq(2));
    assert_that!(manager.get_partitions(&log).await?, empty());
    assert_that!(manager.list_partitions(&partitioned).await?, empty());

    create(partitioned.clone(), partitioned_id).await?;
    assert_that!(
        manager.get_partitions(&partitioned).await?,
        elements_are![eq("2024")]
    );
    Ok(())
}

#[test(tokio::test)]
async fn placeholder_database_nodes_are_not_databases() -> googletest::Result<()> {
    let manager = manager_with_database().await;
    // a schema registration creates its missing ancestors as empty nodes
    manager
        .repository()
        .register_schema(&TablePath::new("ghost", "t"), &schema())
        .await?;

    assert!(!manager.database_exists("ghost").await?);
    assert_that!(manager.list_databases().await?, elements_are![eq(DATABASE)]);
    assert!(matches!(
        manager.drop_database("ghost", false, true).await,
        Err(CatalogError::DatabaseNotExist(_))
    ));

    let descriptor = DatabaseDescriptor::default().with_comment("taken over");
    manager
        .create_database("ghost", descriptor.clone(), false)
        .await?;
    assert_that!(manager.get_database("ghost").await?.descriptor, eq(descriptor));
    assert_that!(
        manager.list_databases().await?,
        unordered_elements_are![eq(DATABASE), eq("ghost")]
    );
    assert!(matches!(
        manager
            .create_database("ghost", DatabaseDescriptor::default(), false)
            .await,
        Err(CatalogError::DatabaseAlreadyExists(_))
    ));
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DeleteFault {
    #[default]
    None,
    /// Deletes fail with a network error.
    Unavailable,
    /// Deletes succeed but report the node as gone, as if a concurrent delete won.
    Raced,
}

/// In-memory store whose deletes can be made to fail.
#[derive(Clone, Default)]
struct FaultyDeletes {
    inner: InMemoryCoordinationStore,
    fault: Arc<Mutex<DeleteFault>>,
}

impl FaultyDeletes {
    fn set_fault(&self, fault: DeleteFault) {
        *self.fault.lock() = fault;
    }
}

#[async_trait]
impl CoordinationStore for FaultyDeletes {
    async fn get(
        &self,
        path: ByteString,
    ) -> std::result::Result<Option<VersionedValue>, ReadError> {
        self.inner.get(path).await
    }

    async fn exists(&self, path: ByteString) -> std::result::Result<bool, ReadError> {
        self.inner.exists(path).await
    }

    async fn get_children(
        &self,
        path: ByteString,
    ) -> std::result::Result<Vec<String>, ReadError> {
        self.inner.get_children(path).await
    }

    async fn put(
        &self,
        path: ByteString,
        value: Bytes,
        precondition: Precondition,
    ) -> std::result::Result<Version, WriteError> {
        self.inner.put(path, value, precondition).await
    }

    async fn delete(
        &self,
        path: ByteString,
        precondition: Precondition,
    ) -> std::result::Result<(), WriteError> {
        let fault = *self.fault.lock();
        match fault {
            DeleteFault::None => self.inner.delete(path, precondition).await,
            DeleteFault::Unavailable => Err(WriteError::Network(
                format!("injected failure: {path}").into(),
            )),
            DeleteFault::Raced => {
                self.inner.delete(path.clone(), precondition).await?;
                Err(WriteError::NoNode(path))
            }
        }
    }

    async fn watch_children(
        &self,
        path: ByteString,
        notifications: mpsc::Sender<ChildrenChanged>,
    ) -> std::result::Result<WatchHandle, ReadError> {
        self.inner.watch_children(path, notifications).await
    }
}

async fn manager_with_partition(store: &FaultyDeletes) -> (MetadataManager, TablePath, TableId) {
    let manager = manager(&CoordinationStoreClient::new(store.clone(), None));
    manager
        .create_database(DATABASE, DatabaseDescriptor::default(), false)
        .await
        .unwrap();
    let table_path = TablePath::new(DATABASE, "partitioned");
    let table_id = manager
        .create_table(&table_path, partitioned_table(), Some(assignment()), false)
        .await
        .unwrap()
        .unwrap();
    manager
        .create_partition(
            &table_path,
            table_id,
            PartitionAssignment::new(table_id, assignment()),
            &ResolvedPartitionSpec::single("dt", "2024").unwrap(),
            false,
        )
        .await
        .unwrap();
    (manager, table_path, table_id)
}

#[test(tokio::test)]
async fn drop_failures_are_reported() -> googletest::Result<()> {
    let store = FaultyDeletes::default();
    let (manager, table_path, table_id) = manager_with_partition(&store).await;
    let spec = ResolvedPartitionSpec::single("dt", "2024")?;
    let partitions = manager.list_partitions(&table_path).await?;

    store.set_fault(DeleteFault::Unavailable);
    assert!(matches!(
        manager.drop_partition(&table_path, &spec, false).await,
        Err(CatalogError::OperationFailed { .. })
    ));
    assert!(matches!(
        manager.drop_table(&table_path, false).await,
        Err(CatalogError::OperationFailed { .. })
    ));
    assert!(matches!(
        manager.drop_database(DATABASE, false, true).await,
        Err(CatalogError::OperationFailed { .. })
    ));
    assert!(matches!(
        manager.complete_delete_table(table_id).await,
        Err(CatalogError::OperationFailed { .. })
    ));
    assert!(matches!(
        manager.complete_delete_partition(partitions["2024"]).await,
        Err(CatalogError::OperationFailed { .. })
    ));

    assert_that!(manager.list_partitions(&table_path).await?, eq(partitions));
    assert!(manager.table_exists(&table_path).await?);
    assert!(manager.database_exists(DATABASE).await?);
    Ok(())
}

#[test(tokio::test)]
async fn concurrently_dropped_entities_count_as_dropped() -> googletest::Result<()> {
    let store = FaultyDeletes::default();
    let (manager, table_path, _) = manager_with_partition(&store).await;
    let spec = ResolvedPartitionSpec::single("dt", "2024")?;

    store.set_fault(DeleteFault::Raced);
    manager.drop_partition(&table_path, &spec, false).await?;
    assert_that!(manager.get_partitions(&table_path).await?, empty());

    manager.drop_table(&table_path, false).await?;
    assert!(!manager.table_exists(&table_path).await?);

    manager.drop_database(DATABASE, false, true).await?;
    assert!(!manager.database_exists(DATABASE).await?);
    Ok(())
}
