// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Turns structural changes of the catalog into [`CoordinatorEvent`]s. The
//! [`TableChangeWatcher`] observes the coordination store and is the only producer of events;
//! coordination logic consumes them through an [`EventManager`].

mod event;
mod event_manager;
mod watcher;

pub use event::{
    CoordinatorEvent, CreatePartitionEvent, CreateTableEvent, DropPartitionEvent, DropTableEvent,
};
pub use event_manager::{ChannelEventManager, CollectingEventManager, EventManager};
pub use watcher::{TableChangeWatcher, WatcherError};
