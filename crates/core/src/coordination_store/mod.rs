// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

pub mod providers;

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use bytestring::ByteString;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use tidewater_types::errors::{GenericError, MaybeRetryableError};
use tidewater_types::retries::RetryPolicy;
use tidewater_types::storage::{StorageCodec, StorageDecode, StorageEncode};
use tidewater_types::{Version, Versioned};

use crate::coordination_store::providers::memory::InMemoryCoordinationStore;

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("node '{0}' does not exist")]
    NoNode(ByteString),
    #[error("network error: {0}")]
    Network(GenericError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("codec error: {0}")]
    Codec(GenericError),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("node '{0}' does not exist")]
    NoNode(ByteString),
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("network error: {0}")]
    Network(GenericError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("codec error: {0}")]
    Codec(GenericError),
}

impl MaybeRetryableError for ReadError {
    fn retryable(&self) -> bool {
        matches!(self, ReadError::Network(_))
    }
}

impl MaybeRetryableError for WriteError {
    fn retryable(&self) -> bool {
        matches!(self, WriteError::Network(_))
    }
}

/// Raw content of a node together with the version it was read at. Nodes that only exist as
/// parents of other nodes have an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub version: Version,
    pub value: Bytes,
}

impl VersionedValue {
    pub fn new(version: Version, value: Bytes) -> Self {
        Self { version, value }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl Versioned for VersionedValue {
    fn version(&self) -> Version {
        self.version
    }
}

/// Preconditions for the write operations of the [`CoordinationStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// No precondition
    None,
    /// Node must not exist for the write operation to succeed.
    DoesNotExist,
    /// Node must have the provided [`Version`] for the write operation to succeed.
    MatchesVersion(Version),
}

/// Delivered to a children watch whenever a node at or below the watched path is created,
/// updated, or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildrenChanged {
    pub changed_path: ByteString,
}

/// Registration of a children watch. Dropping the handle or calling [`WatchHandle::cancel`]
/// unregisters the watch; no notifications are delivered afterwards.
#[derive(Debug)]
pub struct WatchHandle {
    path: ByteString,
    _guard: DropGuard,
}

impl WatchHandle {
    /// Creates a handle whose registration stays active until `token` is cancelled. Providers
    /// must stop notifying once the token is cancelled.
    pub fn new(path: ByteString, token: CancellationToken) -> Self {
        Self {
            path,
            _guard: token.drop_guard(),
        }
    }

    pub fn path(&self) -> &ByteString {
        &self.path
    }

    pub fn cancel(self) {
        drop(self);
    }
}

/// Hierarchical coordination store abstraction. Paths are absolute, `/` separated, and have no
/// trailing separator. Implementations need to support linearizable reads and atomic compare and
/// swap operations on single nodes.
#[async_trait]
pub trait CoordinationStore {
    /// Gets the value and its current version for the given path. If the node is not present,
    /// then return [`None`].
    async fn get(&self, path: ByteString) -> Result<Option<VersionedValue>, ReadError>;

    async fn exists(&self, path: ByteString) -> Result<bool, ReadError>;

    /// Lists the names of the direct children of the given path in lexicographic order. Fails with
    /// [`ReadError::NoNode`] if the node is not present.
    async fn get_children(&self, path: ByteString) -> Result<Vec<String>, ReadError>;

    /// Writes the value to the given path following the provided precondition and returns the
    /// new version of the node. Missing parent nodes are created with an empty value. If the
    /// precondition is not met, then the operation returns a [`WriteError::FailedPrecondition`].
    async fn put(
        &self,
        path: ByteString,
        value: Bytes,
        precondition: Precondition,
    ) -> Result<Version, WriteError>;

    /// Deletes the node and all of its descendants following the provided precondition. Fails
    /// with [`WriteError::NoNode`] if the node is not present.
    async fn delete(&self, path: ByteString, precondition: Precondition) -> Result<(), WriteError>;

    /// Registers a watch on the subtree rooted at `path`. Every mutation at or below `path`
    /// sends a [`ChildrenChanged`] to `notifications`; notifications are dropped while the
    /// channel is full since receivers re-read the subtree anyway. The path does not need to
    /// exist.
    async fn watch_children(
        &self,
        path: ByteString,
        notifications: mpsc::Sender<ChildrenChanged>,
    ) -> Result<WatchHandle, ReadError>;
}

/// Coordination store client which stores [`StorageEncode`] values in a [`CoordinationStore`].
#[derive(Clone)]
pub struct CoordinationStoreClient {
    inner: Arc<dyn CoordinationStore + Send + Sync>,
    backoff_policy: Option<RetryPolicy>,
}

impl CoordinationStoreClient {
    pub fn new<S>(store: S, backoff_policy: Option<RetryPolicy>) -> Self
    where
        S: CoordinationStore + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(store),
            backoff_policy,
        }
    }

    pub fn from_shared(
        store: Arc<dyn CoordinationStore + Send + Sync>,
        backoff_policy: Option<RetryPolicy>,
    ) -> Self {
        Self {
            inner: store,
            backoff_policy,
        }
    }

    pub fn new_in_memory() -> Self {
        CoordinationStoreClient::new(InMemoryCoordinationStore::default(), None)
    }

    /// Returns a client sharing the same store but retrying concurrent modifications with the
    /// given policy.
    pub fn with_backoff_policy(&self, backoff_policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            backoff_policy: Some(backoff_policy),
        }
    }

    /// Gets the raw value and version of the node at the given path.
    pub async fn get_versioned_value(
        &self,
        path: ByteString,
    ) -> Result<Option<VersionedValue>, ReadError> {
        self.inner.get(path).await
    }

    /// Gets and decodes the value at the given path. Nodes with an empty value are reported as
    /// [`None`] just like absent nodes.
    pub async fn get<T: StorageDecode>(&self, path: ByteString) -> Result<Option<T>, ReadError> {
        match self.inner.get(path).await? {
            Some(versioned_value) => decode_value(versioned_value),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, path: ByteString) -> Result<bool, ReadError> {
        self.inner.exists(path).await
    }

    pub async fn get_children(&self, path: ByteString) -> Result<Vec<String>, ReadError> {
        self.inner.get_children(path).await
    }

    /// Encodes and writes the value to the given path following the provided precondition. If the
    /// precondition is not met, then the operation returns a [`WriteError::FailedPrecondition`].
    pub async fn put<T>(
        &self,
        path: ByteString,
        value: &T,
        precondition: Precondition,
    ) -> Result<Version, WriteError>
    where
        T: StorageEncode,
    {
        let value =
            StorageCodec::encode_to_bytes(value).map_err(|err| WriteError::Codec(err.into()))?;
        self.inner.put(path, value, precondition).await
    }

    /// Deletes the node at the given path together with all of its descendants.
    pub async fn delete(
        &self,
        path: ByteString,
        precondition: Precondition,
    ) -> Result<(), WriteError> {
        self.inner.delete(path, precondition).await
    }

    pub async fn watch_children(
        &self,
        path: ByteString,
        notifications: mpsc::Sender<ChildrenChanged>,
    ) -> Result<WatchHandle, ReadError> {
        self.inner.watch_children(path, notifications).await
    }

    /// Reads the value under the given path from the coordination store, then modifies it and
    /// writes the result back. The write only succeeds if the node has not been modified in the
    /// meantime. If this should happen, then the read-modify-write cycle is retried.
    pub async fn read_modify_write<T, F, E>(
        &self,
        path: ByteString,
        mut modify: F,
    ) -> Result<T, ReadModifyWriteError<E>>
    where
        T: StorageEncode + StorageDecode,
        F: FnMut(Option<T>) -> Result<T, E>,
    {
        let mut backoff_policy = self.backoff_policy.as_ref().map(|p| p.iter());

        loop {
            let (old_value, precondition) = match self
                .inner
                .get(path.clone())
                .await
                .map_err(ReadWriteError::from)?
            {
                Some(versioned_value) => {
                    let precondition = Precondition::MatchesVersion(versioned_value.version);
                    let old_value =
                        decode_value::<T>(versioned_value).map_err(ReadWriteError::from)?;
                    (old_value, precondition)
                }
                None => (None, Precondition::DoesNotExist),
            };

            let result = modify(old_value);

            match result {
                Ok(new_value) => match self.put(path.clone(), &new_value, precondition).await {
                    Ok(_) => return Ok(new_value),
                    Err(WriteError::FailedPrecondition(msg)) => {
                        if let Some(backoff) = backoff_policy.as_mut().and_then(|p| p.next()) {
                            debug!(
                                "Concurrent value update: {msg}; retrying in '{}'",
                                humantime::format_duration(backoff)
                            );
                            tokio::time::sleep(backoff).await;
                        } else {
                            return Err(ReadWriteError::RetriesExhausted(path).into());
                        }
                    }
                    Err(err) => return Err(ReadModifyWriteError::ReadWrite(err.into())),
                },
                Err(err) => return Err(ReadModifyWriteError::FailedOperation(err)),
            }
        }
    }

    /// Atomically increments the counter stored at `path` and returns its previous value.
    /// Counters start at `0`.
    pub async fn allocate_next_id(&self, path: ByteString) -> Result<u64, ReadWriteError> {
        let next = self
            .read_modify_write(path, |current: Option<u64>| {
                Ok::<_, Infallible>(current.unwrap_or_default() + 1)
            })
            .await
            .map_err(|err| match err {
                ReadModifyWriteError::ReadWrite(err) => err,
                ReadModifyWriteError::FailedOperation(never) => match never {},
            })?;

        Ok(next - 1)
    }
}

fn decode_value<T: StorageDecode>(
    mut versioned_value: VersionedValue,
) -> Result<Option<T>, ReadError> {
    if versioned_value.is_empty() {
        return Ok(None);
    }

    StorageCodec::decode::<T, _>(&mut versioned_value.value)
        .map(Some)
        .map_err(|err| ReadError::Codec(err.into()))
}

#[derive(Debug, thiserror::Error)]
pub enum ReadWriteError {
    #[error("node '{0}' does not exist")]
    NoNode(ByteString),
    #[error("network error: {0}")]
    Network(GenericError),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("codec error: {0}")]
    Codec(GenericError),
    #[error("retries for operation on path '{0}' exhausted")]
    RetriesExhausted(ByteString),
}

#[derive(Debug, thiserror::Error)]
pub enum ReadModifyWriteError<E = String> {
    #[error(transparent)]
    ReadWrite(#[from] ReadWriteError),
    #[error("failed read-modify-write operation: {0}")]
    FailedOperation(E),
}

impl<E> ReadModifyWriteError<E>
where
    E: From<ReadWriteError>,
{
    pub fn transpose(self) -> E {
        match self {
            ReadModifyWriteError::ReadWrite(err) => err.into(),
            ReadModifyWriteError::FailedOperation(err) => err,
        }
    }
}

impl From<ReadError> for ReadWriteError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::NoNode(path) => ReadWriteError::NoNode(path),
            ReadError::Network(err) => ReadWriteError::Network(err),
            ReadError::Internal(msg) => ReadWriteError::Internal(msg),
            ReadError::Codec(err) => ReadWriteError::Codec(err),
        }
    }
}

impl From<WriteError> for ReadWriteError {
    fn from(value: WriteError) -> Self {
        match value {
            WriteError::FailedPrecondition(msg) => ReadWriteError::Internal(format!(
                "unexpected failed precondition outside of a retry loop: {msg}"
            )),
            WriteError::NoNode(path) => ReadWriteError::NoNode(path),
            WriteError::Network(err) => ReadWriteError::Network(err),
            WriteError::Internal(msg) => ReadWriteError::Internal(msg),
            WriteError::Codec(err) => ReadWriteError::Codec(err),
        }
    }
}

pub trait CoordinationStoreClientError {
    fn is_network_error(&self) -> bool;
}

impl<E> CoordinationStoreClientError for ReadModifyWriteError<E> {
    fn is_network_error(&self) -> bool {
        match self {
            ReadModifyWriteError::ReadWrite(err) => err.is_network_error(),
            ReadModifyWriteError::FailedOperation(_) => false,
        }
    }
}

impl CoordinationStoreClientError for ReadWriteError {
    fn is_network_error(&self) -> bool {
        matches!(self, ReadWriteError::Network(_))
    }
}

impl CoordinationStoreClientError for ReadError {
    fn is_network_error(&self) -> bool {
        matches!(self, ReadError::Network(_))
    }
}

impl CoordinationStoreClientError for WriteError {
    fn is_network_error(&self) -> bool {
        matches!(self, WriteError::Network(_))
    }
}

static_assertions::assert_impl_all!(CoordinationStoreClient: Send, Sync, Clone);
