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
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, trace, warn, Instrument};

use tidewater_catalog::{paths, CatalogError, CatalogRepository};
use tidewater_core::{ChildrenChanged, WatchHandle};
use tidewater_types::catalog::TablePath;
use tidewater_types::config::WatcherOptions;
use tidewater_types::identifiers::{PartitionId, TableId};

use super::WatcherTask;
use crate::{CreatePartitionEvent, DropPartitionEvent, EventManager};

/// Partitions a new partition watcher considers as already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Baseline {
    /// Partitions present when the watcher starts are known; only later changes are published.
    Current,
    /// Nothing is known; partitions present when the watcher starts are published as created.
    Empty,
}

/// Watches the partitions of a single table.
pub(super) struct PartitionChangeWatcher {
    table_path: TablePath,
    task: WatcherTask<PartitionSync>,
    shutdown_timeout: Duration,
}

impl PartitionChangeWatcher {
    pub async fn start(
        repository: CatalogRepository,
        event_manager: Arc<dyn EventManager>,
        table_path: TablePath,
        table_id: TableId,
        options: &WatcherOptions,
        baseline: Baseline,
    ) -> Result<Self, CatalogError> {
        let (tx, notifications) = mpsc::channel(options.notification_queue_length());
        let watch = repository
            .watch_children(paths::partitions(&table_path), tx)
            .await?;

        let mut sync = PartitionSync {
            repository,
            event_manager,
            table_path: table_path.clone(),
            table_id,
            known: BTreeMap::new(),
        };
        if baseline == Baseline::Current {
            sync.sync(false).await;
        }

        let cancellation = CancellationToken::new();
        let span = debug_span!("partition-watcher", %table_path, %table_id);
        let handle = tokio::spawn(
            run(
                sync,
                notifications,
                watch,
                cancellation.clone(),
                baseline == Baseline::Empty,
            )
            .instrument(span),
        );

        Ok(Self {
            table_path,
            task: WatcherTask::new(cancellation, handle),
            shutdown_timeout: options.shutdown_timeout,
        })
    }

    /// Stops watching after a last sync, which publishes the drop of every partition that is
    /// gone by now. Used once the table itself has disappeared.
    pub async fn finish(self) {
        match self.task.shutdown(self.shutdown_timeout).await {
            Some(mut sync) => sync.sync(true).await,
            None => warn!(
                table_path = %self.table_path,
                "Lost the partition state of a dropped table; drops of its partitions are not published"
            ),
        }
    }

    /// Stops watching without publishing any further events.
    pub async fn stop(self) {
        let _ = self.task.shutdown(self.shutdown_timeout).await;
    }
}

async fn run(
    mut sync: PartitionSync,
    mut notifications: mpsc::Receiver<ChildrenChanged>,
    watch: WatchHandle,
    cancellation: CancellationToken,
    initial_sync: bool,
) -> PartitionSync {
    if initial_sync {
        sync.sync(true).await;
    }

    loop {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => break,
            notification = notifications.recv() => match notification {
                Some(ChildrenChanged { changed_path }) => {
                    trace!(%changed_path, "Partitions changed");
                    sync.sync(true).await;
                }
                None => {
                    debug!("Coordination store closed the partition watch");
                    break;
                }
            }
        }
    }

    watch.cancel();
    sync
}

/// Diff state of the partitions of one table.
struct PartitionSync {
    repository: CatalogRepository,
    event_manager: Arc<dyn EventManager>,
    table_path: TablePath,
    table_id: TableId,
    known: BTreeMap<PartitionId, String>,
}

impl PartitionSync {
    /// Re-reads the partitions of the table and publishes an event for every partition that
    /// appeared or disappeared since the last sync. Partitions that cannot be read are skipped
    /// and retried on the next sync.
    async fn sync(&mut self, publish: bool) {
        let partition_names = match self.repository.list_partition_names(&self.table_path).await
        {
            Ok(partition_names) => partition_names,
            Err(err) => {
                warn!(table_path = %self.table_path, "Failed to list partitions: {err}");
                return;
            }
        };

        let mut current = BTreeMap::new();
        for partition_name in partition_names {
            match self
                .repository
                .get_partition(&self.table_path, &partition_name)
                .await
            {
                Ok(Some(partition)) if partition.table_id == self.table_id => {
                    current.insert(partition.partition_id, partition_name);
                }
                // deleted in the meantime, or belongs to a re-created table of the same path
                Ok(_) => {}
                Err(err) => {
                    warn!(partition = %partition_name, "Failed to read partition: {err}");
                    current.extend(
                        self.known
                            .iter()
                            .filter(|(_, name)| **name == partition_name)
                            .map(|(id, name)| (*id, name.clone())),
                    );
                }
            }
        }

        if !publish {
            self.known = current;
            return;
        }

        for (partition_id, partition_name) in &self.known {
            if !current.contains_key(partition_id) {
                debug!(%partition_id, partition = %partition_name, "Partition dropped");
                self.event_manager.publish(
                    DropPartitionEvent {
                        table_id: self.table_id,
                        partition_id: *partition_id,
                        partition_name: partition_name.clone(),
                    }
                    .into(),
                );
            }
        }

        let mut next_known = BTreeMap::new();
        for (partition_id, partition_name) in current {
            if !self.known.contains_key(&partition_id) {
                match self
                    .repository
                    .get_partition_assignment(partition_id)
                    .await
                {
                    Ok(Some(assignment)) => {
                        debug!(%partition_id, partition = %partition_name, "Partition created");
                        self.event_manager.publish(
                            CreatePartitionEvent {
                                table_path: self.table_path.clone(),
                                table_id: self.table_id,
                                partition_id,
                                partition_name: partition_name.clone(),
                                assignment,
                            }
                            .into(),
                        );
                    }
                    Ok(None) => {
                        warn!(%partition_id, "Partition has no assignment; skipping it");
                        continue;
                    }
                    Err(err) => {
                        warn!(%partition_id, "Failed to read partition assignment: {err}");
                        continue;
                    }
                }
            }
            next_known.insert(partition_id, partition_name);
        }
        self.known = next_known;
    }
}
