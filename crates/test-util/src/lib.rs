// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Test utilities shared by the Tidewater crates.

use std::future::Future;
use std::time::Duration;

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds. Meant for state that converges asynchronously, like events
/// emitted by background watchers.
///
/// # Panics
///
/// If `condition` does not hold within `timeout`.
pub async fn retry_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition did not hold within {timeout:?}");
        }
        tracing::trace!("Condition does not hold yet; retrying");
        tokio::time::sleep(RETRY_INTERVAL).await;
    }
}
