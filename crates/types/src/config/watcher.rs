// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::serde_util::DurationString;

/// # Change watcher options
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[serde(rename_all = "kebab-case")]
#[builder(default)]
pub struct WatcherOptions {
    /// # Notification queue length
    ///
    /// Number of pending change notifications buffered per watched subtree. Notifications
    /// beyond this limit are coalesced since every cycle re-lists the subtree.
    notification_queue_length: NonZeroUsize,

    /// # Shutdown timeout
    ///
    /// How long `stop()` waits for the watcher task to finish its current cycle.
    #[serde_as(as = "DurationString")]
    pub shutdown_timeout: Duration,
}

impl WatcherOptions {
    pub fn notification_queue_length(&self) -> usize {
        self.notification_queue_length.get()
    }
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            notification_queue_length: NonZeroUsize::MIN.saturating_add(63),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}
