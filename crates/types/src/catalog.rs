// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Data model of the catalog: databases, tables, schemas, partitions, and bucket assignments.

mod assignment;
mod database;
mod partition;
mod path;
mod schema;
mod table;

pub use assignment::*;
pub use database::*;
pub use partition::*;
pub use path::*;
pub use schema::*;
pub use table::*;

/// Maximum length of database names, table names, and partition values.
pub const MAX_NAME_LENGTH: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidNameError {
    #[error("{kind} name must not be empty")]
    Empty { kind: &'static str },
    #[error("{kind} name '{name}' is longer than {MAX_NAME_LENGTH} characters")]
    TooLong { kind: &'static str, name: String },
    #[error("{kind} name '{name}' contains the illegal character '{illegal}'")]
    IllegalCharacter {
        kind: &'static str,
        name: String,
        illegal: char,
    },
}

/// Names become path segments in the coordination store, hence they must be non-empty and must
/// not contain the path separator.
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), InvalidNameError> {
    if name.is_empty() {
        return Err(InvalidNameError::Empty { kind });
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(InvalidNameError::TooLong {
            kind,
            name: name.to_owned(),
        });
    }
    if let Some(illegal) = name.chars().find(|c| *c == '/' || c.is_control()) {
        return Err(InvalidNameError::IllegalCharacter {
            kind,
            name: name.to_owned(),
            illegal,
        });
    }
    Ok(())
}
