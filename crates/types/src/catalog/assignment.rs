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

use crate::identifiers::{BucketId, ServerId, TableId};

/// Ordered replica set of a bucket. The first replica is the preferred leader.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BucketAssignment {
    pub replicas: Vec<ServerId>,
}

impl BucketAssignment {
    pub fn new(replicas: impl IntoIterator<Item = ServerId>) -> Self {
        Self {
            replicas: replicas.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("cannot place {replication_factor} replicas on {servers} tablet servers")]
    InsufficientServers {
        replication_factor: usize,
        servers: usize,
    },
    #[error("bucket count and replication factor must be positive")]
    Empty,
}

/// Bucket to replica-set mapping of a non-partitioned table. Partitioned tables have an empty
/// table assignment; their buckets are assigned per partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TableAssignment {
    pub buckets: BTreeMap<BucketId, BucketAssignment>,
}

impl TableAssignment {
    pub fn new(buckets: BTreeMap<BucketId, BucketAssignment>) -> Self {
        Self { buckets }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Spreads `bucket_count` buckets with `replication_factor` replicas each over `servers` in a
    /// round-robin fashion, shifting the first replica of consecutive buckets by one server.
    pub fn round_robin(
        bucket_count: u32,
        replication_factor: usize,
        servers: &[ServerId],
    ) -> Result<Self, AssignmentError> {
        if bucket_count == 0 || replication_factor == 0 {
            return Err(AssignmentError::Empty);
        }
        if servers.len() < replication_factor {
            return Err(AssignmentError::InsufficientServers {
                replication_factor,
                servers: servers.len(),
            });
        }

        let buckets = (0..bucket_count)
            .map(|bucket| {
                let first = bucket as usize % servers.len();
                let replicas = (0..replication_factor).map(|i| servers[(first + i) % servers.len()]);
                (BucketId::new(bucket), BucketAssignment::new(replicas))
            })
            .collect();
        Ok(Self { buckets })
    }
}

/// Bucket assignment of a single partition, tagged with the table it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PartitionAssignment {
    pub table_id: TableId,
    pub buckets: BTreeMap<BucketId, BucketAssignment>,
}

impl PartitionAssignment {
    pub fn new(table_id: TableId, assignment: TableAssignment) -> Self {
        Self {
            table_id,
            buckets: assignment.buckets,
        }
    }
}

crate::json_storage_encode_decode!(TableAssignment);
crate::json_storage_encode_decode!(PartitionAssignment);
