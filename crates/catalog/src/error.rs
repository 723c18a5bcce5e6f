// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use tidewater_types::catalog::{InvalidNameError, PartitionSpecError, TablePath};
use tidewater_types::errors::GenericError;
use tidewater_types::identifiers::SchemaId;

/// Failures of catalog operations. All kinds but [`CatalogError::OperationFailed`] are expected
/// outcomes callers can branch on.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("database '{0}' already exists")]
    DatabaseAlreadyExists(String),
    #[error("database '{0}' does not exist")]
    DatabaseNotExist(String),
    #[error("database '{0}' is not empty")]
    DatabaseNotEmpty(String),
    #[error("table '{0}' already exists")]
    TableAlreadyExists(TablePath),
    #[error("table '{0}' does not exist")]
    TableNotExist(TablePath),
    #[error("table '{0}' is not partitioned")]
    TableNotPartitioned(TablePath),
    #[error(
        "schema '{}' of table '{table_path}' does not exist",
        .schema_id.map_or_else(|| "latest".to_owned(), |id| id.to_string())
    )]
    SchemaNotExist {
        table_path: TablePath,
        schema_id: Option<SchemaId>,
    },
    #[error("partition '{partition}' of table '{table_path}' already exists")]
    PartitionAlreadyExists {
        table_path: TablePath,
        partition: String,
    },
    #[error("partition '{partition}' of table '{table_path}' does not exist")]
    PartitionNotExist {
        table_path: TablePath,
        partition: String,
    },
    #[error("invalid table descriptor: {0}")]
    InvalidTableDescriptor(String),
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),
    #[error(transparent)]
    InvalidPartitionSpec(#[from] PartitionSpecError),
    #[error("catalog operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: GenericError,
    },
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::DatabaseNotExist(_)
                | CatalogError::TableNotExist(_)
                | CatalogError::SchemaNotExist { .. }
                | CatalogError::PartitionNotExist { .. }
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            CatalogError::DatabaseAlreadyExists(_)
                | CatalogError::TableAlreadyExists(_)
                | CatalogError::PartitionAlreadyExists { .. }
        )
    }

    pub fn operation_failed(context: impl Display, source: impl Into<GenericError>) -> Self {
        CatalogError::OperationFailed {
            context: context.to_string(),
            source: source.into(),
        }
    }
}

/// Wraps unexpected coordination store failures into [`CatalogError::OperationFailed`] together
/// with a description of the failed operation.
pub trait WithContext<T> {
    fn context<C, F>(self, context: F) -> Result<T, CatalogError>
    where
        C: Display,
        F: FnOnce() -> C;
}

impl<T, E> WithContext<T> for Result<T, E>
where
    E: Into<GenericError>,
{
    fn context<C, F>(self, context: F) -> Result<T, CatalogError>
    where
        C: Display,
        F: FnOnce() -> C,
    {
        self.map_err(|err| CatalogError::operation_failed(context(), err))
    }
}
