/*
 *  Copyright 2026 Haven Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Error types for the storage layer.
//!
//! Validation variants are raised before any I/O; store failures propagate
//! unchanged. An empty checkout/pop result is `Ok(None)` / an empty `Vec`,
//! never an error.

use thiserror::Error;
use uuid::Uuid;

/// Largest payload accepted in a queue item's `value` column, in bytes.
pub const MAX_VALUE_BYTES: usize = 65_535;

/// Errors surfaced by the storage DAL.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Tenant identifier failed validation at construction.
    #[error("invalid tenant id: {0}")]
    InvalidTenantId(String),

    /// An item listed itself as its own dependency, which would deadlock
    /// checkout forever.
    #[error("item {0} cannot depend on itself")]
    SelfDependency(Uuid),

    /// Payload exceeds [`MAX_VALUE_BYTES`].
    #[error("payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// Failure obtaining a pooled connection or running the blocking
    /// interact closure.
    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    /// Any error from the underlying store, propagated unchanged.
    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    /// Migration runner failure during database setup.
    #[error("migration error: {0}")]
    Migration(String),
}
