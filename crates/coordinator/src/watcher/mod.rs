// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod partition_change_watcher;
mod table_change_watcher;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;

use tidewater_catalog::CatalogError;

pub use table_change_watcher::TableChangeWatcher;

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("watcher is already running")]
    AlreadyRunning,
    #[error("failed to start watching: {0}")]
    Catalog(#[from] CatalogError),
}

/// Background task of a running watcher. Each watcher processes its notifications on a single
/// task, so the diff state is never accessed concurrently. Dropping the task cancels it.
struct WatcherTask<T> {
    cancel_on_drop: DropGuard,
    handle: JoinHandle<T>,
}

impl<T> WatcherTask<T> {
    fn new(cancellation: CancellationToken, handle: JoinHandle<T>) -> Self {
        Self {
            cancel_on_drop: cancellation.drop_guard(),
            handle,
        }
    }

    /// Cancels the task and waits for it to hand back its state. Aborts the task if it does not
    /// finish within `timeout`.
    async fn shutdown(self, timeout: Duration) -> Option<T> {
        let Self {
            cancel_on_drop,
            mut handle,
        } = self;
        drop(cancel_on_drop);

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(state)) => Some(state),
            Ok(Err(err)) => {
                warn!("Watcher task failed: {err}");
                None
            }
            Err(_) => {
                warn!("Watcher task did not stop within {timeout:?}; aborting it");
                handle.abort();
                None
            }
        }
    }
}
