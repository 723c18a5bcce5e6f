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

use tracing::{debug, error, info, instrument};

use tidewater_core::{CoordinationStoreClient, Precondition};
use tidewater_types::catalog::{
    validate_name, DatabaseDescriptor, DatabaseInfo, PartitionAssignment,
    ResolvedPartitionSpec, SchemaInfo, TableAssignment, TableDescriptor, TableInfo, TablePath,
};
use tidewater_types::config::{CatalogOptions, LakeStorageOptions};
use tidewater_types::identifiers::{PartitionId, SchemaId, TableId, WriterId};

use crate::registrations::{DatabaseRegistration, TablePartition, TableRegistration};
use crate::repository::{CatalogRepository, TableNode};
use crate::validation::validate_table_descriptor;
use crate::CatalogError;

/// Public catalog API. Enforces the catalog invariants on top of the [`CatalogRepository`];
/// uniqueness relies on the atomicity of the coordination store, so multiple managers may
/// operate on the same store concurrently.
///
/// Drops only remove catalog nodes. Cleaning up the physical state of dropped tables and
/// partitions is driven by the change watchers and finished through
/// [`MetadataManager::complete_delete_table`] and [`MetadataManager::complete_delete_partition`].
#[derive(Clone)]
pub struct MetadataManager {
    repository: CatalogRepository,
    lake: Option<LakeStorageOptions>,
}

impl MetadataManager {
    pub fn new(client: CoordinationStoreClient, options: &CatalogOptions) -> Self {
        Self {
            repository: CatalogRepository::new(client, options),
            lake: options.lake.clone(),
        }
    }

    pub fn repository(&self) -> &CatalogRepository {
        &self.repository
    }

    // ---- databases ----

    pub async fn create_database(
        &self,
        database_name: &str,
        descriptor: DatabaseDescriptor,
        ignore_if_exists: bool,
    ) -> Result<(), CatalogError> {
        validate_name("database", database_name)?;

        match self
            .repository
            .register_database(database_name, &DatabaseRegistration::new(descriptor))
            .await
        {
            Err(CatalogError::DatabaseAlreadyExists(_)) if ignore_if_exists => Ok(()),
            Ok(()) => {
                info!(database = database_name, "Created database");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_database(&self, database_name: &str) -> Result<DatabaseInfo, CatalogError> {
        validate_name("database", database_name)?;
        self.repository
            .get_database(database_name)
            .await?
            .map(|registration| registration.into_database_info(database_name))
            .ok_or_else(|| CatalogError::DatabaseNotExist(database_name.to_owned()))
    }

    pub async fn database_exists(&self, database_name: &str) -> Result<bool, CatalogError> {
        validate_name("database", database_name)?;
        Ok(self.repository.get_database(database_name).await?.is_some())
    }

    pub async fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        self.repository.list_databases().await
    }

    /// Drops the database node and everything below it. Without `cascade` only empty databases
    /// can be dropped.
    pub async fn drop_database(
        &self,
        database_name: &str,
        ignore_if_not_exists: bool,
        cascade: bool,
    ) -> Result<(), CatalogError> {
        validate_name("database", database_name)?;
        if !self.database_exists(database_name).await? {
            return if ignore_if_not_exists {
                Ok(())
            } else {
                Err(CatalogError::DatabaseNotExist(database_name.to_owned()))
            };
        }

        if !cascade && !self.repository.list_tables(database_name).await?.is_empty() {
            return Err(CatalogError::DatabaseNotEmpty(database_name.to_owned()));
        }

        match self.repository.delete_database(database_name).await {
            Ok(()) => {
                info!(database = database_name, cascade, "Dropped database");
                Ok(())
            }
            Err(CatalogError::DatabaseNotExist(_)) => {
                debug!(database = database_name, "Database was dropped concurrently");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    // ---- tables ----

    pub async fn list_tables(&self, database_name: &str) -> Result<Vec<String>, CatalogError> {
        validate_name("database", database_name)?;
        if !self.database_exists(database_name).await? {
            return Err(CatalogError::DatabaseNotExist(database_name.to_owned()));
        }
        self.repository.list_tables(database_name).await
    }

    pub async fn table_exists(&self, table_path: &TablePath) -> Result<bool, CatalogError> {
        table_path.validate()?;
        Ok(self.repository.get_table(table_path).await?.is_some())
    }

    /// Creates a table and returns its id, or [`None`] if the table exists and
    /// `ignore_if_exists` is set.
    ///
    /// The schema is registered before the table id is allocated and the table registered. A
    /// failure in between leaves an unreferenced schema behind but never a table without schema.
    /// The table registration is conditional on the node state observed after registering the
    /// schema, so of several concurrent creations exactly one wins.
    #[instrument(level = "debug", skip_all, fields(%table_path))]
    pub async fn create_table(
        &self,
        table_path: &TablePath,
        descriptor: TableDescriptor,
        assignment: Option<TableAssignment>,
        ignore_if_exists: bool,
    ) -> Result<Option<TableId>, CatalogError> {
        table_path.validate()?;
        validate_table_descriptor(&descriptor)?;

        if !self.database_exists(table_path.database_name()).await? {
            return Err(CatalogError::DatabaseNotExist(
                table_path.database_name().to_owned(),
            ));
        }
        if self.table_exists(table_path).await? {
            return already_exists(table_path, ignore_if_exists);
        }

        let schema_id = self
            .repository
            .register_schema(table_path, descriptor.schema())
            .await?;

        let precondition = match self.repository.get_table_node(table_path).await? {
            TableNode::Placeholder(version) => Precondition::MatchesVersion(version),
            TableNode::Absent => {
                return Err(CatalogError::operation_failed(
                    format!("create table '{table_path}'"),
                    "table node disappeared while registering its schema",
                ))
            }
            TableNode::Registered(_) => return already_exists(table_path, ignore_if_exists),
        };

        let table_id = self.repository.allocate_table_id().await?;
        if let Some(assignment) = &assignment {
            self.repository
                .register_table_assignment(table_id, assignment)
                .await?;
        }

        let registration = TableRegistration::new(table_id, schema_id, descriptor);
        match self
            .repository
            .register_table(table_path, &registration, precondition)
            .await
        {
            Ok(()) => {
                info!(%table_path, %table_id, %schema_id, "Created table");
                Ok(Some(table_id))
            }
            Err(CatalogError::TableAlreadyExists(_)) => {
                if assignment.is_some() {
                    if let Err(err) = self.repository.delete_table_assignment(table_id).await {
                        debug!(
                            %table_id,
                            "Failed to delete assignment of lost table creation: {err}"
                        );
                    }
                }
                already_exists(table_path, ignore_if_exists)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolves a table. Lake-enabled tables inherit the default table options of the
    /// configured lake storage.
    pub async fn get_table(&self, table_path: &TablePath) -> Result<TableInfo, CatalogError> {
        table_path.validate()?;
        let registration = self
            .repository
            .get_table(table_path)
            .await?
            .ok_or_else(|| CatalogError::TableNotExist(table_path.clone()))?;
        let schema_id = registration.schema_id;
        let schema = self
            .repository
            .get_schema(table_path, schema_id)
            .await?
            .ok_or_else(|| schema_not_exist(table_path, Some(schema_id)))?;

        let mut table_info = registration.into_table_info(table_path.clone(), schema);
        if let Some(lake) = &self.lake {
            if table_info.descriptor.is_datalake_enabled() {
                table_info.descriptor = table_info
                    .descriptor
                    .with_default_properties(&lake.default_table_options);
            }
        }
        Ok(table_info)
    }

    /// Schema the table registration currently points to.
    pub async fn get_latest_schema(
        &self,
        table_path: &TablePath,
    ) -> Result<SchemaInfo, CatalogError> {
        table_path.validate()?;
        let registration = self
            .repository
            .get_table(table_path)
            .await?
            .ok_or_else(|| schema_not_exist(table_path, None))?;
        self.get_schema_by_id(table_path, registration.schema_id)
            .await
    }

    pub async fn get_schema_by_id(
        &self,
        table_path: &TablePath,
        schema_id: SchemaId,
    ) -> Result<SchemaInfo, CatalogError> {
        table_path.validate()?;
        self.repository
            .get_schema(table_path, schema_id)
            .await?
            .map(|schema| SchemaInfo::new(schema_id, schema))
            .ok_or_else(|| schema_not_exist(table_path, Some(schema_id)))
    }

    /// Removes the table from the catalog. The table's assignment stays until
    /// [`MetadataManager::complete_delete_table`] is called.
    pub async fn drop_table(
        &self,
        table_path: &TablePath,
        ignore_if_not_exists: bool,
    ) -> Result<(), CatalogError> {
        if !self.table_exists(table_path).await? {
            return not_exist(table_path, ignore_if_not_exists);
        }

        match self.repository.delete_table(table_path).await {
            Ok(()) => {
                info!(%table_path, "Dropped table");
                Ok(())
            }
            Err(CatalogError::TableNotExist(_)) => {
                debug!(%table_path, "Table was dropped concurrently");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes the assignment of a dropped table. Idempotent.
    pub async fn complete_delete_table(&self, table_id: TableId) -> Result<(), CatalogError> {
        if self.repository.delete_table_assignment(table_id).await? {
            debug!(%table_id, "Deleted table assignment");
        }
        Ok(())
    }

    /// Deletes the assignment of a dropped partition. Idempotent.
    pub async fn complete_delete_partition(
        &self,
        partition_id: PartitionId,
    ) -> Result<(), CatalogError> {
        if self
            .repository
            .delete_partition_assignment(partition_id)
            .await?
        {
            debug!(%partition_id, "Deleted partition assignment");
        }
        Ok(())
    }

    // ---- partitions ----

    /// Creates a partition of a table.
    ///
    /// The table must be registered under `table_id` and be partitioned. Apart from these checks
    /// only the existence check reports failures. Allocating the partition id and registering the
    /// assignment and the partition node are best effort; failures are logged and leave at most
    /// an assignment without partition node behind, which readers ignore.
    pub async fn create_partition(
        &self,
        table_path: &TablePath,
        table_id: TableId,
        assignment: PartitionAssignment,
        partition_spec: &ResolvedPartitionSpec,
        ignore_if_exists: bool,
    ) -> Result<(), CatalogError> {
        let registration = self.partitioned_table(table_path).await?;
        if registration.table_id != table_id {
            debug!(
                %table_path,
                %table_id,
                registered_table_id = %registration.table_id,
                "Table was re-created; rejecting partition of the former table"
            );
            return Err(CatalogError::TableNotExist(table_path.clone()));
        }

        let partition_name = partition_spec.partition_name();
        if self
            .repository
            .get_partition(table_path, &partition_name)
            .await?
            .is_some()
        {
            return if ignore_if_exists {
                Ok(())
            } else {
                Err(CatalogError::PartitionAlreadyExists {
                    table_path: table_path.clone(),
                    partition: partition_spec.qualified_name(),
                })
            };
        }

        match self
            .register_partition(table_path, table_id, &partition_name, &assignment)
            .await
        {
            Ok(partition_id) => {
                info!(%table_path, %partition_id, partition = %partition_name, "Created partition");
            }
            Err(err) => {
                error!(
                    %table_path,
                    partition = %partition_name,
                    "Failed to create partition: {err}"
                );
            }
        }
        Ok(())
    }

    async fn register_partition(
        &self,
        table_path: &TablePath,
        table_id: TableId,
        partition_name: &str,
        assignment: &PartitionAssignment,
    ) -> Result<PartitionId, CatalogError> {
        let partition_id = self.repository.allocate_partition_id().await?;
        self.repository
            .register_partition_assignment(partition_id, assignment)
            .await?;
        self.repository
            .register_partition(
                table_path,
                partition_name,
                &TablePartition::new(table_id, partition_id),
            )
            .await?;
        Ok(partition_id)
    }

    /// Removes the partition from the catalog. The partition's assignment stays until
    /// [`MetadataManager::complete_delete_partition`] is called.
    pub async fn drop_partition(
        &self,
        table_path: &TablePath,
        partition_spec: &ResolvedPartitionSpec,
        ignore_if_not_exists: bool,
    ) -> Result<(), CatalogError> {
        table_path.validate()?;
        let partition_name = partition_spec.partition_name();
        let partition_not_exist = || {
            if ignore_if_not_exists {
                Ok(())
            } else {
                Err(CatalogError::PartitionNotExist {
                    table_path: table_path.clone(),
                    partition: partition_spec.qualified_name(),
                })
            }
        };

        if self
            .repository
            .get_partition(table_path, &partition_name)
            .await?
            .is_none()
        {
            return partition_not_exist();
        }

        match self
            .repository
            .delete_partition(table_path, &partition_name)
            .await
        {
            Ok(()) => {
                info!(%table_path, partition = %partition_name, "Dropped partition");
                Ok(())
            }
            Err(CatalogError::PartitionNotExist { .. }) => {
                debug!(
                    %table_path,
                    partition = %partition_name,
                    "Partition was dropped concurrently"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Partition names of a table mapped to their ids.
    pub async fn list_partitions(
        &self,
        table_path: &TablePath,
    ) -> Result<BTreeMap<String, PartitionId>, CatalogError> {
        self.partitioned_table(table_path).await?;

        let mut partitions = BTreeMap::new();
        for partition_name in self.repository.list_partition_names(table_path).await? {
            if let Some(partition) = self
                .repository
                .get_partition(table_path, &partition_name)
                .await?
            {
                partitions.insert(partition_name, partition.partition_id);
            }
        }
        Ok(partitions)
    }

    /// Partition names of a table. Empty for tables without partitions.
    pub async fn get_partitions(
        &self,
        table_path: &TablePath,
    ) -> Result<Vec<String>, CatalogError> {
        table_path.validate()?;
        self.repository.list_partition_names(table_path).await
    }

    /// Registration of a table that must exist and be partitioned.
    async fn partitioned_table(
        &self,
        table_path: &TablePath,
    ) -> Result<TableRegistration, CatalogError> {
        table_path.validate()?;
        let registration = self
            .repository
            .get_table(table_path)
            .await?
            .ok_or_else(|| CatalogError::TableNotExist(table_path.clone()))?;
        if !registration.is_partitioned() {
            return Err(CatalogError::TableNotPartitioned(table_path.clone()));
        }
        Ok(registration)
    }

    // ---- writers ----

    pub async fn init_writer_id(&self) -> Result<WriterId, CatalogError> {
        self.repository.allocate_writer_id().await
    }
}

fn already_exists(
    table_path: &TablePath,
    ignore_if_exists: bool,
) -> Result<Option<TableId>, CatalogError> {
    if ignore_if_exists {
        Ok(None)
    } else {
        Err(CatalogError::TableAlreadyExists(table_path.clone()))
    }
}

fn not_exist(table_path: &TablePath, ignore_if_not_exists: bool) -> Result<(), CatalogError> {
    if ignore_if_not_exists {
        Ok(())
    } else {
        Err(CatalogError::TableNotExist(table_path.clone()))
    }
}

fn schema_not_exist(table_path: &TablePath, schema_id: Option<SchemaId>) -> CatalogError {
    CatalogError::SchemaNotExist {
        table_path: table_path.clone(),
        schema_id,
    }
}

static_assertions::assert_impl_all!(MetadataManager: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use googletest::prelude::*;
    use test_log::test;

    use tidewater_types::catalog::{DataType, Schema, TABLE_DATALAKE_ENABLED};
    use tidewater_types::config::CatalogOptionsBuilder;

    use super::*;

    fn descriptor() -> TableDescriptor {
        TableDescriptor::builder()
            .schema(
                Schema::builder()
                    .column("id", DataType::BigInt)
                    .column("name", DataType::String)
                    .primary_key(["id"])
                    .build(),
            )
            .distributed_by(3, ["id"])
            .build()
    }

    async fn manager_with_database(options: &CatalogOptions) -> MetadataManager {
        let manager = MetadataManager::new(CoordinationStoreClient::new_in_memory(), options);
        manager
            .create_database("db", DatabaseDescriptor::default(), false)
            .await
            .unwrap();
        manager
    }

    #[test(tokio::test)]
    async fn schema_ids_increase_per_table() {
        let manager = manager_with_database(&CatalogOptions::default()).await;
        let table_path = TablePath::new("db", "t");
        let repository = manager.repository();

        let first = repository
            .register_schema(&table_path, descriptor().schema())
            .await
            .unwrap();
        let second = repository
            .register_schema(&table_path, descriptor().schema())
            .await
            .unwrap();

        assert_that!(first, eq(SchemaId::INITIAL));
        assert_that!(second, eq(SchemaId::new(2)));
        // schemas alone do not make a table
        assert!(!manager.table_exists(&table_path).await.unwrap());
        assert_that!(manager.list_tables("db").await.unwrap(), empty());
    }

    #[test(tokio::test)]
    async fn create_table_after_orphaned_schema() {
        let manager = manager_with_database(&CatalogOptions::default()).await;
        let table_path = TablePath::new("db", "t");
        manager
            .repository()
            .register_schema(&table_path, descriptor().schema())
            .await
            .unwrap();

        let table_id = manager
            .create_table(&table_path, descriptor(), None, false)
            .await
            .unwrap();

        assert_that!(table_id, some(eq(TableId::new(0))));
        let latest = manager.get_latest_schema(&table_path).await.unwrap();
        assert_that!(latest.schema_id, eq(SchemaId::new(2)));
    }

    #[test(tokio::test)]
    async fn lake_defaults_apply_to_lake_enabled_tables() {
        let options = CatalogOptionsBuilder::default()
            .lake(
                LakeStorageOptions::new("paimon")
                    .with_default_table_option("table.datalake.format", "paimon")
                    .with_default_table_option(TABLE_DATALAKE_ENABLED, "false"),
            )
            .build()
            .unwrap();
        let manager = manager_with_database(&options).await;

        let lake_table = TablePath::new("db", "lake");
        let lake_descriptor = TableDescriptor::builder()
            .schema(descriptor().schema().clone())
            .property(TABLE_DATALAKE_ENABLED, "true")
            .build();
        manager
            .create_table(&lake_table, lake_descriptor, None, false)
            .await
            .unwrap();
        let plain_table = TablePath::new("db", "plain");
        manager
            .create_table(&plain_table, descriptor(), None, false)
            .await
            .unwrap();

        let properties = manager
            .get_table(&lake_table)
            .await
            .unwrap()
            .descriptor
            .properties()
            .clone();
        assert_that!(
            properties.get("table.datalake.format").map(String::as_str),
            some(eq("paimon"))
        );
        // table's own properties win
        assert_that!(
            properties.get(TABLE_DATALAKE_ENABLED).map(String::as_str),
            some(eq("true"))
        );

        let plain = manager.get_table(&plain_table).await.unwrap();
        assert_that!(
            plain.descriptor.properties().get("table.datalake.format"),
            none()
        );
    }

    #[test(tokio::test)]
    async fn invalid_names_are_rejected_before_any_write() {
        let manager = MetadataManager::new(
            CoordinationStoreClient::new_in_memory(),
            &CatalogOptions::default(),
        );

        assert!(matches!(
            manager
                .create_database("a/b", DatabaseDescriptor::default(), false)
                .await,
            Err(CatalogError::InvalidName(_))
        ));
        assert!(matches!(
            manager
                .create_table(&TablePath::new("db", ""), descriptor(), None, false)
                .await,
            Err(CatalogError::InvalidName(_))
        ));
        assert_that!(manager.list_databases().await.unwrap(), empty());
    }
}
