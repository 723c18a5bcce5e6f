// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::CoordinatorEvent;

/// Ordered sink of coordinator events. Publishing must not block; slow consumers buffer on their
/// side.
pub trait EventManager: Send + Sync + 'static {
    fn publish(&self, event: CoordinatorEvent);
}

impl<T: EventManager + ?Sized> EventManager for Arc<T> {
    fn publish(&self, event: CoordinatorEvent) {
        (**self).publish(event)
    }
}

/// Forwards events to the receiver returned by [`ChannelEventManager::new`].
#[derive(Debug, Clone)]
pub struct ChannelEventManager {
    sender: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl ChannelEventManager {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventManager for ChannelEventManager {
    fn publish(&self, event: CoordinatorEvent) {
        if let Err(err) = self.sender.send(event) {
            debug!(event = ?err.0, "Dropping coordinator event since the consumer is gone");
        }
    }
}

/// Records all published events.
#[derive(Debug, Default, Clone)]
pub struct CollectingEventManager {
    events: Arc<Mutex<Vec<CoordinatorEvent>>>,
}

impl CollectingEventManager {
    pub fn events(&self) -> Vec<CoordinatorEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear()
    }
}

impl EventManager for CollectingEventManager {
    fn publish(&self, event: CoordinatorEvent) {
        self.events.lock().push(event);
    }
}
