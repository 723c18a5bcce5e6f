// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The metadata catalog: databases, tables, schemas, and partitions persisted in the
//! coordination store, plus the [`MetadataManager`] enforcing the catalog invariants on top of it.

mod error;
mod metadata_manager;
pub mod paths;
mod registrations;
mod repository;
mod validation;

pub use error::{CatalogError, WithContext};
pub use metadata_manager::MetadataManager;
pub use registrations::{DatabaseRegistration, TablePartition, TableRegistration};
pub use repository::{CatalogRepository, TableNode};
pub use validation::validate_table_descriptor;
