// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::time::Duration;

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

/// Serializable type to represent a duration as a human-readable string such as `10s` or
/// `1h 30m`.
///
/// Use it with `#[serde_as(as = "DurationString")]`.
pub struct DurationString;

impl DurationString {
    pub fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(s)
    }

    pub fn display(duration: Duration) -> String {
        humantime::format_duration(duration).to_string()
    }
}

impl<'de> DeserializeAs<'de, Duration> for DurationString {
    fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(Error::custom)
    }
}

impl SerializeAs<Duration> for DurationString {
    fn serialize_as<S>(source: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&humantime::format_duration(*source))
    }
}
