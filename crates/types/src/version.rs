// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

/// Version of a node in the coordination store. Every successful write bumps the version of the
/// written node by one. Nodes start at [`Version::MIN`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[display("v{}", _0)]
#[serde(transparent)]
pub struct Version(u32);

impl Version {
    pub const INVALID: Version = Version(0);
    pub const MIN: Version = Version(1);

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

/// A type that carries the version it was read at.
pub trait Versioned {
    /// Returns the version of the versioned value
    fn version(&self) -> Version;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ordered() {
        assert!(Version::INVALID < Version::MIN);
        assert_eq!(Version::from(2), Version::MIN.next());
        assert_eq!("v1", Version::MIN.to_string());
    }
}
