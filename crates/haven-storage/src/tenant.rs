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

//! Tenant identification.
//!
//! Every row in every queue table is owned by a tenant, and every statement
//! the DAL issues is scoped by the tenant id as a mandatory predicate.
//! Validation happens once, at construction, so DAL code can treat a
//! [`TenantId`] as known-good.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Maximum length of a tenant identifier.
const MAX_TENANT_ID_LENGTH: usize = 255;

/// A validated tenant (identity) identifier.
///
/// Tenant ids are non-empty, at most 255 characters, and restricted to
/// lowercase ASCII alphanumerics, `.` and `-` (hostname-shaped, as the
/// identity host assigns them).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Validates and wraps a tenant identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, StorageError> {
        let id = id.into();

        if id.is_empty() || id.len() > MAX_TENANT_ID_LENGTH {
            return Err(StorageError::InvalidTenantId(format!(
                "length must be 1-{} characters, got {}",
                MAX_TENANT_ID_LENGTH,
                id.len()
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
        {
            return Err(StorageError::InvalidTenantId(format!(
                "'{}' contains characters outside [a-z0-9.-]",
                id
            )));
        }

        Ok(Self(id))
    }

    /// Returns the tenant id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
