// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use bytestring::ByteString;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use tidewater_core::{
    ChildrenChanged, CoordinationStoreClient, Precondition, ReadError, VersionedValue,
    WatchHandle, WriteError,
};
use tidewater_types::catalog::{PartitionAssignment, Schema, TableAssignment, TablePath};
use tidewater_types::config::CatalogOptions;
use tidewater_types::identifiers::{PartitionId, SchemaId, TableId, WriterId};
use tidewater_types::retries::RetryPolicy;
use tidewater_types::storage::StorageDecode;
use tidewater_types::Version;

use crate::error::{CatalogError, WithContext};
use crate::paths;
use crate::registrations::{DatabaseRegistration, TablePartition, TableRegistration};

/// State of a table node. Registering a schema creates the table node as an empty parent before
/// the table itself is registered.
#[derive(Debug)]
pub enum TableNode {
    Absent,
    Placeholder(Version),
    Registered(TableRegistration),
}

/// Typed access to the catalog nodes in the coordination store. Every store failure that is not
/// an expected catalog outcome is wrapped into [`CatalogError::OperationFailed`] with the
/// operation it happened in.
#[derive(Clone)]
pub struct CatalogRepository {
    client: CoordinationStoreClient,
    id_client: CoordinationStoreClient,
    schema_registration_retry_policy: RetryPolicy,
}

impl CatalogRepository {
    pub fn new(client: CoordinationStoreClient, options: &CatalogOptions) -> Self {
        Self {
            id_client: client.with_backoff_policy(options.id_allocation_retry_policy.clone()),
            client,
            schema_registration_retry_policy: options.schema_registration_retry_policy.clone(),
        }
    }

    pub fn client(&self) -> &CoordinationStoreClient {
        &self.client
    }

    // ---- databases ----

    /// Registers a database. A node left behind as the parent of other nodes is taken over; a
    /// registered database is reported as [`CatalogError::DatabaseAlreadyExists`].
    pub async fn register_database(
        &self,
        database_name: &str,
        registration: &DatabaseRegistration,
    ) -> Result<(), CatalogError> {
        let path = paths::database(database_name);
        let precondition = match self
            .client
            .get_versioned_value(path.clone())
            .await
            .context(|| format!("get database '{database_name}'"))?
        {
            None => Precondition::DoesNotExist,
            Some(value) if value.is_empty() => {
                debug!(database = database_name, "Taking over placeholder database node");
                Precondition::MatchesVersion(value.version)
            }
            Some(_) => {
                return Err(CatalogError::DatabaseAlreadyExists(
                    database_name.to_owned(),
                ))
            }
        };

        match self.client.put(path, registration, precondition).await {
            Err(WriteError::FailedPrecondition(_)) => Err(CatalogError::DatabaseAlreadyExists(
                database_name.to_owned(),
            )),
            result => result
                .map(|_| ())
                .context(|| format!("register database '{database_name}'")),
        }
    }

    pub async fn get_database(
        &self,
        database_name: &str,
    ) -> Result<Option<DatabaseRegistration>, CatalogError> {
        self.client
            .get(paths::database(database_name))
            .await
            .context(|| format!("get database '{database_name}'"))
    }

    /// Names of the registered databases. Nodes that only exist as parents of other nodes are not
    /// databases.
    pub async fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        let names = self.list_database_names().await?;

        let lookups = names.into_iter().map(|name| async move {
            let registered = self.get_database(&name).await?.is_some();
            Ok::<_, CatalogError>(registered.then_some(name))
        });

        Ok(futures::future::try_join_all(lookups)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Names of all database nodes, including nodes without a database registration.
    pub async fn list_database_names(&self) -> Result<Vec<String>, CatalogError> {
        self.list_children(paths::databases())
            .await
            .context(|| "list databases")
    }

    pub async fn delete_database(&self, database_name: &str) -> Result<(), CatalogError> {
        match self
            .client
            .delete(paths::database(database_name), Precondition::None)
            .await
        {
            Err(WriteError::NoNode(_)) => {
                Err(CatalogError::DatabaseNotExist(database_name.to_owned()))
            }
            result => result.context(|| format!("delete database '{database_name}'")),
        }
    }

    // ---- tables ----

    /// Names of the tables of a database. Nodes left behind by a schema registration without a
    /// table registration are not tables.
    pub async fn list_tables(&self, database_name: &str) -> Result<Vec<String>, CatalogError> {
        let names = self.list_table_names(database_name).await?;

        let lookups = names.into_iter().map(|name| async move {
            let table_path = TablePath::new(database_name, name);
            let registered = matches!(
                self.get_table_node(&table_path).await?,
                TableNode::Registered(_)
            );
            Ok::<_, CatalogError>(registered.then(|| table_path.table_name().to_owned()))
        });

        Ok(futures::future::try_join_all(lookups)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    /// Names of all table nodes of a database, including nodes without a table registration.
    pub async fn list_table_names(
        &self,
        database_name: &str,
    ) -> Result<Vec<String>, CatalogError> {
        self.list_children(paths::tables(database_name))
            .await
            .context(|| format!("list tables of database '{database_name}'"))
    }

    pub async fn get_table_node(&self, table_path: &TablePath) -> Result<TableNode, CatalogError> {
        let value = self
            .client
            .get_versioned_value(paths::table(table_path))
            .await
            .context(|| format!("get table '{table_path}'"))?;

        match value {
            None => Ok(TableNode::Absent),
            Some(value) if value.is_empty() => Ok(TableNode::Placeholder(value.version)),
            Some(value) => decode(value)
                .map(TableNode::Registered)
                .context(|| format!("decode table '{table_path}'")),
        }
    }

    pub async fn get_table(
        &self,
        table_path: &TablePath,
    ) -> Result<Option<TableRegistration>, CatalogError> {
        match self.get_table_node(table_path).await? {
            TableNode::Registered(registration) => Ok(Some(registration)),
            TableNode::Absent | TableNode::Placeholder(_) => Ok(None),
        }
    }

    /// Writes the table registration if the table node is still in the state `precondition`
    /// describes. A lost race against another registration is reported as
    /// [`CatalogError::TableAlreadyExists`].
    pub async fn register_table(
        &self,
        table_path: &TablePath,
        registration: &TableRegistration,
        precondition: Precondition,
    ) -> Result<(), CatalogError> {
        match self
            .client
            .put(paths::table(table_path), registration, precondition)
            .await
        {
            Err(WriteError::FailedPrecondition(msg)) => {
                debug!(%table_path, "Lost table registration race: {msg}");
                Err(CatalogError::TableAlreadyExists(table_path.clone()))
            }
            result => result
                .map(|_| ())
                .context(|| format!("register table '{table_path}'")),
        }
    }

    /// Deletes the table node together with its schemas and partitions.
    pub async fn delete_table(&self, table_path: &TablePath) -> Result<(), CatalogError> {
        match self
            .client
            .delete(paths::table(table_path), Precondition::None)
            .await
        {
            Err(WriteError::NoNode(_)) => Err(CatalogError::TableNotExist(table_path.clone())),
            result => result.context(|| format!("delete table '{table_path}'")),
        }
    }

    // ---- schemas ----

    /// Registers `schema` under the next free schema id of the table. Concurrent registrations
    /// for the same table race for the same id; the loser retries with the next one.
    pub async fn register_schema(
        &self,
        table_path: &TablePath,
        schema: &Schema,
    ) -> Result<SchemaId, CatalogError> {
        let mut retry_iter = self.schema_registration_retry_policy.iter();

        loop {
            let schema_id = self.latest_schema_id(table_path).await?.next();
            match self
                .client
                .put(
                    paths::schema(table_path, schema_id),
                    schema,
                    Precondition::DoesNotExist,
                )
                .await
            {
                Ok(_) => {
                    trace!(%table_path, %schema_id, "Registered schema");
                    return Ok(schema_id);
                }
                Err(WriteError::FailedPrecondition(msg)) => {
                    if let Some(backoff) = retry_iter.next() {
                        debug!(?backoff, %table_path, "Concurrent schema registration: {msg}");
                        tokio::time::sleep(backoff).await;
                    } else {
                        return Err(CatalogError::operation_failed(
                            format!("register schema of table '{table_path}'"),
                            format!("retries exhausted: {msg}"),
                        ));
                    }
                }
                Err(err) => {
                    return Err(err)
                        .context(|| format!("register schema of table '{table_path}'"))
                }
            }
        }
    }

    /// Highest registered schema id of a table, [`SchemaId::FLOOR`] if there is none.
    async fn latest_schema_id(&self, table_path: &TablePath) -> Result<SchemaId, CatalogError> {
        let ids = self
            .list_children(paths::schemas(table_path))
            .await
            .context(|| format!("list schemas of table '{table_path}'"))?;

        Ok(ids
            .iter()
            .filter_map(|id| id.parse::<SchemaId>().ok())
            .max()
            .unwrap_or(SchemaId::FLOOR))
    }

    pub async fn get_schema(
        &self,
        table_path: &TablePath,
        schema_id: SchemaId,
    ) -> Result<Option<Schema>, CatalogError> {
        self.client
            .get(paths::schema(table_path, schema_id))
            .await
            .context(|| format!("get schema '{schema_id}' of table '{table_path}'"))
    }

    // ---- ids ----

    pub async fn allocate_table_id(&self) -> Result<TableId, CatalogError> {
        self.allocate_id(paths::TABLE_ID_COUNTER).await.map(TableId::new)
    }

    pub async fn allocate_partition_id(&self) -> Result<PartitionId, CatalogError> {
        self.allocate_id(paths::PARTITION_ID_COUNTER)
            .await
            .map(PartitionId::new)
    }

    pub async fn allocate_writer_id(&self) -> Result<WriterId, CatalogError> {
        self.allocate_id(paths::WRITER_ID_COUNTER)
            .await
            .map(WriterId::new)
    }

    async fn allocate_id(&self, counter: &'static str) -> Result<u64, CatalogError> {
        self.id_client
            .allocate_next_id(ByteString::from_static(counter))
            .await
            .context(|| format!("allocate id from '{counter}'"))
    }

    // ---- assignments ----

    pub async fn register_table_assignment(
        &self,
        table_id: TableId,
        assignment: &TableAssignment,
    ) -> Result<(), CatalogError> {
        self.client
            .put(
                paths::table_assignment(table_id),
                assignment,
                Precondition::None,
            )
            .await
            .map(|_| ())
            .context(|| format!("register assignment of table {table_id}"))
    }

    pub async fn get_table_assignment(
        &self,
        table_id: TableId,
    ) -> Result<Option<TableAssignment>, CatalogError> {
        self.client
            .get(paths::table_assignment(table_id))
            .await
            .context(|| format!("get assignment of table {table_id}"))
    }

    /// Deletes the assignment and the bucket state below it. Returns `false` if it was already
    /// gone.
    pub async fn delete_table_assignment(&self, table_id: TableId) -> Result<bool, CatalogError> {
        let path = paths::table_assignment(table_id);
        self.delete_if_exists(path)
            .await
            .context(|| format!("delete assignment of table {table_id}"))
    }

    pub async fn register_partition_assignment(
        &self,
        partition_id: PartitionId,
        assignment: &PartitionAssignment,
    ) -> Result<(), CatalogError> {
        self.client
            .put(
                paths::partition_assignment(partition_id),
                assignment,
                Precondition::None,
            )
            .await
            .map(|_| ())
            .context(|| format!("register assignment of partition {partition_id}"))
    }

    pub async fn get_partition_assignment(
        &self,
        partition_id: PartitionId,
    ) -> Result<Option<PartitionAssignment>, CatalogError> {
        self.client
            .get(paths::partition_assignment(partition_id))
            .await
            .context(|| format!("get assignment of partition {partition_id}"))
    }

    pub async fn delete_partition_assignment(
        &self,
        partition_id: PartitionId,
    ) -> Result<bool, CatalogError> {
        let path = paths::partition_assignment(partition_id);
        self.delete_if_exists(path)
            .await
            .context(|| format!("delete assignment of partition {partition_id}"))
    }

    // ---- partitions ----

    pub async fn register_partition(
        &self,
        table_path: &TablePath,
        partition_name: &str,
        partition: &TablePartition,
    ) -> Result<(), CatalogError> {
        match self
            .client
            .put(
                paths::partition(table_path, partition_name),
                partition,
                Precondition::DoesNotExist,
            )
            .await
        {
            Err(WriteError::FailedPrecondition(_)) => Err(CatalogError::PartitionAlreadyExists {
                table_path: table_path.clone(),
                partition: partition_name.to_owned(),
            }),
            result => result
                .map(|_| ())
                .context(|| format!("register partition '{partition_name}' of '{table_path}'")),
        }
    }

    pub async fn get_partition(
        &self,
        table_path: &TablePath,
        partition_name: &str,
    ) -> Result<Option<TablePartition>, CatalogError> {
        self.client
            .get(paths::partition(table_path, partition_name))
            .await
            .context(|| format!("get partition '{partition_name}' of '{table_path}'"))
    }

    pub async fn list_partition_names(
        &self,
        table_path: &TablePath,
    ) -> Result<Vec<String>, CatalogError> {
        self.list_children(paths::partitions(table_path))
            .await
            .context(|| format!("list partitions of '{table_path}'"))
    }

    pub async fn delete_partition(
        &self,
        table_path: &TablePath,
        partition_name: &str,
    ) -> Result<(), CatalogError> {
        match self
            .client
            .delete(
                paths::partition(table_path, partition_name),
                Precondition::None,
            )
            .await
        {
            Err(WriteError::NoNode(_)) => Err(CatalogError::PartitionNotExist {
                table_path: table_path.clone(),
                partition: partition_name.to_owned(),
            }),
            result => {
                result.context(|| format!("delete partition '{partition_name}' of '{table_path}'"))
            }
        }
    }

    // ---- watches ----

    pub async fn watch_children(
        &self,
        path: ByteString,
        notifications: mpsc::Sender<ChildrenChanged>,
    ) -> Result<WatchHandle, CatalogError> {
        self.client
            .watch_children(path.clone(), notifications)
            .await
            .context(|| format!("watch '{path}'"))
    }

    /// Children of a node, empty if the node does not exist.
    async fn list_children(&self, path: ByteString) -> Result<Vec<String>, ReadError> {
        match self.client.get_children(path).await {
            Err(ReadError::NoNode(_)) => Ok(Vec::new()),
            result => result,
        }
    }

    async fn delete_if_exists(&self, path: ByteString) -> Result<bool, WriteError> {
        match self.client.delete(path, Precondition::None).await {
            Ok(()) => Ok(true),
            Err(WriteError::NoNode(path)) => {
                trace!(%path, "Node already deleted");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

fn decode<T: StorageDecode>(mut value: VersionedValue) -> Result<T, ReadError> {
    tidewater_types::storage::StorageCodec::decode::<T, _>(&mut value.value)
        .map_err(|err| ReadError::Codec(err.into()))
}

static_assertions::assert_impl_all!(CatalogRepository: Send, Sync, Clone);
