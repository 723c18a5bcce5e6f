// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

pub mod coordination_store;

pub use coordination_store::providers::memory::InMemoryCoordinationStore;
pub use coordination_store::{
    ChildrenChanged, CoordinationStore, CoordinationStoreClient, CoordinationStoreClientError,
    Precondition, ReadError, ReadModifyWriteError, ReadWriteError, VersionedValue, WatchHandle,
    WriteError,
};
