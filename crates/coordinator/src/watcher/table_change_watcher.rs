// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use tidewater_catalog::{paths, CatalogError, MetadataManager};
use tidewater_core::{ChildrenChanged, WatchHandle};
use tidewater_types::catalog::TablePath;
use tidewater_types::config::WatcherOptions;
use tidewater_types::identifiers::TableId;

use super::partition_change_watcher::{Baseline, PartitionChangeWatcher};
use super::{WatcherError, WatcherTask};
use crate::{CreateTableEvent, DropTableEvent, EventManager};

/// Watches the tables of all databases and publishes a [`CreateTableEvent`] or
/// [`DropTableEvent`] for every table that appears or disappears. Partitioned tables get a
/// nested watcher publishing the partition events of the table.
///
/// Tables and partitions present when the watcher starts are not published. Changes that are
/// reverted before the watcher observes them are not published either.
///
/// Dropping a running watcher cancels it without waiting for it to finish.
pub struct TableChangeWatcher {
    metadata_manager: MetadataManager,
    event_manager: Arc<dyn EventManager>,
    options: WatcherOptions,
    task: Option<WatcherTask<()>>,
}

impl TableChangeWatcher {
    pub fn new(
        metadata_manager: MetadataManager,
        event_manager: Arc<dyn EventManager>,
        options: WatcherOptions,
    ) -> Self {
        Self {
            metadata_manager,
            event_manager,
            options,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Registers the watch, reads the current tables as baseline, and starts processing
    /// notifications in the background.
    pub async fn start(&mut self) -> Result<(), WatcherError> {
        if self.task.is_some() {
            return Err(WatcherError::AlreadyRunning);
        }

        let (tx, notifications) = mpsc::channel(self.options.notification_queue_length());
        let watch = self
            .metadata_manager
            .repository()
            .watch_children(paths::databases(), tx)
            .await?;

        let mut sync = TableSync {
            metadata_manager: self.metadata_manager.clone(),
            event_manager: Arc::clone(&self.event_manager),
            options: self.options.clone(),
            known: BTreeMap::new(),
            partition_watchers: HashMap::new(),
        };
        sync.baseline().await?;
        info!(tables = sync.known.len(), "Started watching tables");

        let cancellation = CancellationToken::new();
        let handle = tokio::spawn(
            run(sync, notifications, watch, cancellation.clone())
                .instrument(info_span!("table-watcher")),
        );
        self.task = Some(WatcherTask::new(cancellation, handle));
        Ok(())
    }

    /// Stops the watcher and all partition watchers. No events are published after this returns.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.shutdown(self.options.shutdown_timeout).await;
            info!("Stopped watching tables");
        }
    }
}

async fn run(
    mut sync: TableSync,
    mut notifications: mpsc::Receiver<ChildrenChanged>,
    watch: WatchHandle,
    cancellation: CancellationToken,
) {
    let queue_length = sync.options.notification_queue_length();
    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            notification = notifications.recv() => match notification {
                Some(ChildrenChanged { changed_path }) => {
                    let mut received = 1;
                    let mut table_level = paths::is_table_level(&changed_path);
                    while let Ok(ChildrenChanged { changed_path }) = notifications.try_recv() {
                        received += 1;
                        table_level |= paths::is_table_level(&changed_path);
                    }

                    // a full queue drops notifications, so a batch this large may miss one
                    if table_level || received >= queue_length {
                        trace!(received, "Catalog changed");
                        sync.sync().await;
                    } else {
                        trace!(received, "Ignoring changes below table level");
                    }
                }
                None => {
                    warn!("Coordination store closed the table watch");
                    break;
                }
            }
        }
    }

    watch.cancel();
    for (_, partition_watcher) in sync.partition_watchers.drain() {
        partition_watcher.stop().await;
    }
}

#[derive(Debug, Clone)]
struct KnownTable {
    table_path: TablePath,
    is_partitioned: bool,
}

/// Diff state of the tables.
struct TableSync {
    metadata_manager: MetadataManager,
    event_manager: Arc<dyn EventManager>,
    options: WatcherOptions,
    known: BTreeMap<TableId, KnownTable>,
    partition_watchers: HashMap<TableId, PartitionChangeWatcher>,
}

impl TableSync {
    async fn baseline(&mut self) -> Result<(), CatalogError> {
        self.known = self.read_tables().await?;
        let partitioned: Vec<_> = self
            .known
            .iter()
            .filter(|(_, table)| table.is_partitioned)
            .map(|(table_id, table)| (*table_id, table.table_path.clone()))
            .collect();
        for (table_id, table_path) in partitioned {
            self.start_partition_watcher(table_id, table_path, Baseline::Current)
                .await;
        }
        Ok(())
    }

    /// Re-reads all tables and publishes an event for every table that appeared or disappeared
    /// since the last sync.
    async fn sync(&mut self) {
        let current = match self.read_tables().await {
            Ok(current) => current,
            Err(err) => {
                warn!("Failed to list databases: {err}");
                return;
            }
        };

        let disappeared: Vec<_> = self
            .known
            .iter()
            .filter(|(table_id, _)| !current.contains_key(table_id))
            .map(|(table_id, table)| (*table_id, table.clone()))
            .collect();
        for (table_id, table) in disappeared {
            if let Some(partition_watcher) = self.partition_watchers.remove(&table_id) {
                partition_watcher.finish().await;
            }
            debug!(%table_id, table_path = %table.table_path, "Table dropped");
            self.event_manager.publish(
                DropTableEvent {
                    table_id,
                    is_partitioned_cascade: table.is_partitioned,
                    is_physical_only: false,
                }
                .into(),
            );
            self.known.remove(&table_id);
        }

        for (table_id, table) in current {
            if self.known.contains_key(&table_id) {
                continue;
            }
            if self.publish_created(table_id, &table.table_path).await {
                if table.is_partitioned {
                    let table_path = table.table_path.clone();
                    self.start_partition_watcher(table_id, table_path, Baseline::Empty)
                        .await;
                }
                self.known.insert(table_id, table);
            }
        }

        self.retry_partition_watchers().await;
    }

    /// Reads the ids of all registered tables. Tables whose registration cannot be read keep
    /// their known entry. Fails only if the databases cannot be listed.
    async fn read_tables(&self) -> Result<BTreeMap<TableId, KnownTable>, CatalogError> {
        let repository = self.metadata_manager.repository();
        let databases = repository.list_database_names().await?;

        let mut current = BTreeMap::new();
        for database_name in databases {
            let table_names = match repository.list_table_names(&database_name).await {
                Ok(table_names) => table_names,
                Err(err) => {
                    warn!(database = %database_name, "Failed to list tables: {err}");
                    self.carry_over(&mut current, |table_path| {
                        table_path.database_name() == database_name
                    });
                    continue;
                }
            };

            for table_name in table_names {
                let table_path = TablePath::new(database_name.clone(), table_name);
                match repository.get_table(&table_path).await {
                    Ok(Some(registration)) => {
                        current.insert(
                            registration.table_id,
                            KnownTable {
                                is_partitioned: registration.is_partitioned(),
                                table_path,
                            },
                        );
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(%table_path, "Failed to read table: {err}");
                        self.carry_over(&mut current, |known| *known == table_path);
                    }
                }
            }
        }
        Ok(current)
    }

    fn carry_over(
        &self,
        current: &mut BTreeMap<TableId, KnownTable>,
        predicate: impl Fn(&TablePath) -> bool,
    ) {
        current.extend(
            self.known
                .iter()
                .filter(|(_, table)| predicate(&table.table_path))
                .map(|(table_id, table)| (*table_id, table.clone())),
        );
    }

    /// Publishes the creation of a table. Returns `false` if the table could not be resolved; it
    /// stays unknown and is retried on the next sync.
    async fn publish_created(&self, table_id: TableId, table_path: &TablePath) -> bool {
        let table_info = match self.metadata_manager.get_table(table_path).await {
            Ok(table_info) if table_info.table_id == table_id => table_info,
            Ok(_) => {
                debug!(%table_id, %table_path, "Table was re-created in the meantime");
                return false;
            }
            Err(err) => {
                warn!(%table_id, %table_path, "Failed to resolve table: {err}");
                return false;
            }
        };
        let assignment = match self
            .metadata_manager
            .repository()
            .get_table_assignment(table_id)
            .await
        {
            Ok(assignment) => assignment.unwrap_or_default(),
            Err(err) => {
                warn!(%table_id, %table_path, "Failed to read table assignment: {err}");
                return false;
            }
        };

        debug!(%table_id, %table_path, "Table created");
        self.event_manager.publish(
            CreateTableEvent {
                table_info,
                assignment,
            }
            .into(),
        );
        true
    }

    async fn start_partition_watcher(
        &mut self,
        table_id: TableId,
        table_path: TablePath,
        baseline: Baseline,
    ) {
        match PartitionChangeWatcher::start(
            self.metadata_manager.repository().clone(),
            Arc::clone(&self.event_manager),
            table_path.clone(),
            table_id,
            &self.options,
            baseline,
        )
        .await
        {
            Ok(partition_watcher) => {
                self.partition_watchers.insert(table_id, partition_watcher);
            }
            Err(err) => {
                error!(%table_id, %table_path, "Failed to watch partitions: {err}");
            }
        }
    }

    /// Starts the partition watchers that failed to start before.
    async fn retry_partition_watchers(&mut self) {
        let missing: Vec<_> = self
            .known
            .iter()
            .filter(|(table_id, table)| {
                table.is_partitioned && !self.partition_watchers.contains_key(table_id)
            })
            .map(|(table_id, table)| (*table_id, table.table_path.clone()))
            .collect();
        for (table_id, table_path) in missing {
            self.start_partition_watcher(table_id, table_path, Baseline::Empty)
                .await;
        }
    }
}

static_assertions::assert_impl_all!(TableChangeWatcher: Send, Sync);
