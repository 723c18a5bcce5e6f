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

use async_trait::async_trait;
use bytes::Bytes;
use bytestring::ByteString;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use tidewater_types::Version;

use crate::coordination_store::{
    ChildrenChanged, CoordinationStore, Precondition, ReadError, VersionedValue, WatchHandle,
    WriteError,
};

const ROOT: &str = "/";

/// Coordination store keeping all nodes in memory. Clones share the same nodes, which lets
/// several clients (and thereby several catalog or watcher instances) operate on one store.
#[derive(Clone, Default)]
pub struct InMemoryCoordinationStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, VersionedValue>,
    watches: Vec<ChildrenWatch>,
}

struct ChildrenWatch {
    path: String,
    notifications: mpsc::Sender<ChildrenChanged>,
    token: CancellationToken,
}

impl InMemoryCoordinationStore {
    /// Number of currently registered watches.
    pub fn active_watches(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.prune_watches();
        inner.watches.len()
    }
}

impl Inner {
    fn contains(&self, path: &str) -> bool {
        path == ROOT || self.nodes.contains_key(path)
    }

    fn check_precondition(
        &self,
        path: &str,
        precondition: Precondition,
    ) -> Result<Option<Version>, WriteError> {
        let current_version = self.nodes.get(path).map(|node| node.version);
        match (precondition, current_version) {
            (Precondition::None, _) => Ok(current_version),
            (Precondition::DoesNotExist, None) => Ok(None),
            (Precondition::DoesNotExist, Some(_)) => Err(WriteError::FailedPrecondition(format!(
                "node '{path}' already exists"
            ))),
            (Precondition::MatchesVersion(expected), Some(actual)) if expected == actual => {
                Ok(current_version)
            }
            (Precondition::MatchesVersion(expected), Some(actual)) => {
                Err(WriteError::FailedPrecondition(format!(
                    "expected version '{expected}' of node '{path}' but found version '{actual}'"
                )))
            }
            (Precondition::MatchesVersion(expected), None) => {
                Err(WriteError::FailedPrecondition(format!(
                    "expected version '{expected}' of node '{path}' but it does not exist"
                )))
            }
        }
    }

    fn create_parents(&mut self, path: &str) {
        for (idx, _) in path.match_indices('/').skip(1) {
            self.nodes
                .entry(path[..idx].to_owned())
                .or_insert_with(|| VersionedValue::new(Version::MIN, Bytes::new()));
        }
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = child_prefix(path);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| {
                let name = &key[prefix.len()..];
                (!name.contains('/')).then(|| name.to_owned())
            })
            .collect()
    }

    fn remove_subtree(&mut self, path: &str) {
        let prefix = child_prefix(path);
        let descendants: Vec<_> = self
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in descendants {
            self.nodes.remove(&key);
        }
        self.nodes.remove(path);
    }

    fn prune_watches(&mut self) {
        self.watches
            .retain(|watch| !watch.token.is_cancelled() && !watch.notifications.is_closed());
    }

    fn notify(&mut self, changed_path: &str) {
        self.prune_watches();

        let changed_path = ByteString::from(changed_path);
        self.watches.retain(|watch| {
            if !is_related(&watch.path, &changed_path) {
                return true;
            }

            match watch.notifications.try_send(ChildrenChanged {
                changed_path: changed_path.clone(),
            }) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    trace!(watch = %watch.path, %changed_path, "Coalescing children notification");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
    }
}

/// Whether a mutation of `changed` can change the subtree rooted at `watched`. This is the case
/// for nodes within the subtree and for ancestors of the watched node.
fn is_related(watched: &str, changed: &str) -> bool {
    watched == ROOT
        || changed == watched
        || is_descendant(changed, watched)
        || is_descendant(watched, changed)
}

fn is_descendant(path: &str, ancestor: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn child_prefix(path: &str) -> String {
    if path == ROOT {
        ROOT.to_owned()
    } else {
        format!("{path}/")
    }
}

fn validate_path(path: &str) -> Result<(), String> {
    if path == ROOT {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(format!("invalid path '{path}'"));
    }
    Ok(())
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn get(&self, path: ByteString) -> Result<Option<VersionedValue>, ReadError> {
        validate_path(&path).map_err(ReadError::Internal)?;
        Ok(self.inner.lock().nodes.get(&*path).cloned())
    }

    async fn exists(&self, path: ByteString) -> Result<bool, ReadError> {
        validate_path(&path).map_err(ReadError::Internal)?;
        Ok(self.inner.lock().contains(&path))
    }

    async fn get_children(&self, path: ByteString) -> Result<Vec<String>, ReadError> {
        validate_path(&path).map_err(ReadError::Internal)?;
        let inner = self.inner.lock();
        if !inner.contains(&path) {
            return Err(ReadError::NoNode(path));
        }
        Ok(inner.children(&path))
    }

    async fn put(
        &self,
        path: ByteString,
        value: Bytes,
        precondition: Precondition,
    ) -> Result<Version, WriteError> {
        validate_path(&path).map_err(WriteError::Internal)?;
        if path == ROOT {
            return Err(WriteError::Internal("cannot write the root node".to_owned()));
        }

        let mut inner = self.inner.lock();
        let current_version = inner.check_precondition(&path, precondition)?;
        let version = current_version.map_or(Version::MIN, Version::next);

        inner.create_parents(&path);
        inner
            .nodes
            .insert(path.to_string(), VersionedValue::new(version, value));
        trace!(%path, %version, "Put node");

        inner.notify(&path);
        Ok(version)
    }

    async fn delete(&self, path: ByteString, precondition: Precondition) -> Result<(), WriteError> {
        validate_path(&path).map_err(WriteError::Internal)?;
        if path == ROOT {
            return Err(WriteError::Internal("cannot delete the root node".to_owned()));
        }

        let mut inner = self.inner.lock();
        if !inner.contains(&path) {
            return Err(WriteError::NoNode(path));
        }
        inner.check_precondition(&path, precondition)?;

        inner.remove_subtree(&path);
        trace!(%path, "Deleted node");

        inner.notify(&path);
        Ok(())
    }

    async fn watch_children(
        &self,
        path: ByteString,
        notifications: mpsc::Sender<ChildrenChanged>,
    ) -> Result<WatchHandle, ReadError> {
        validate_path(&path).map_err(ReadError::Internal)?;

        let token = CancellationToken::new();
        let mut inner = self.inner.lock();
        inner.prune_watches();
        inner.watches.push(ChildrenWatch {
            path: path.to_string(),
            notifications,
            token: token.clone(),
        });
        debug!(%path, "Registered children watch");

        Ok(WatchHandle::new(path, token))
    }
}
