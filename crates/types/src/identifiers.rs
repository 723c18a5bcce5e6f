// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Identifiers of catalog entities. Table, partition, and writer ids are allocated from
//! counters in the coordination store and are never reused.

use std::fmt;
use std::str::FromStr;

macro_rules! counter_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            PartialEq,
            Eq,
            Ord,
            PartialOrd,
            Clone,
            Copy,
            Hash,
            derive_more::From,
            derive_more::Into,
            derive_more::Display,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[display("{}", _0)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }
    };
}

counter_id!(
    /// Identifies a table for its whole lifetime. A table that is dropped and re-created under
    /// the same path gets a new id.
    TableId,
    "t"
);
counter_id!(
    /// Globally unique partition identifier.
    PartitionId,
    "p"
);
counter_id!(
    /// Identifies a writer (producer) session across the cluster.
    WriterId,
    "w"
);

/// Version of a table's schema. The first schema registered for a table gets
/// [`SchemaId::INITIAL`]; every schema change bumps it by one.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("{}", _0)]
#[serde(transparent)]
pub struct SchemaId(u32);

impl SchemaId {
    /// Lowest schema id; never assigned to a schema.
    pub const FLOOR: SchemaId = SchemaId(0);
    pub const INITIAL: SchemaId = SchemaId(1);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl FromStr for SchemaId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Index of a bucket within a table or partition.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("{}", _0)]
#[serde(transparent)]
pub struct BucketId(u32);

impl BucketId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Identifies a tablet server that hosts bucket replicas.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Ord,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("ts{}", _0)]
#[serde(transparent)]
pub struct ServerId(u32);

impl ServerId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}
