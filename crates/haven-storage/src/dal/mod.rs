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

//! Data Access Layer for the queue tables.
//!
//! The [`DAL`] struct is the root handle; per-queue accessors partially
//! apply the owning tenant, so every statement a queue DAL issues is scoped
//! by that tenant's identity. No operation crosses tenants.
//!
//! # Example
//!
//! ```rust,ignore
//! use haven_storage::dal::DAL;
//! use haven_storage::database::Database;
//! use haven_storage::tenant::TenantId;
//!
//! let db = Database::new("identity.db");
//! db.run_migrations().await?;
//!
//! let dal = DAL::new(db);
//! let tenant = TenantId::new("frodo.example.org")?;
//! let item = dal.outbox(&tenant).checkout_next_item().await?;
//! ```

pub mod models;

pub mod feed_outbox;
pub mod inbox;
pub mod outbox;

pub use feed_outbox::FeedOutboxDAL;
pub use inbox::InboxDAL;
pub use outbox::OutboxDAL;

use crate::database::Database;
use crate::tenant::TenantId;

/// Root handle for all queue operations.
///
/// `DAL` is `Clone`; each clone references the same connection pool and can
/// be shared between worker tasks.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance over the given database.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns the outbox DAL scoped to one tenant.
    pub fn outbox<'a>(&'a self, tenant: &'a TenantId) -> OutboxDAL<'a> {
        OutboxDAL::new(self, tenant)
    }

    /// Returns the inbox DAL scoped to one tenant.
    pub fn inbox<'a>(&'a self, tenant: &'a TenantId) -> InboxDAL<'a> {
        InboxDAL::new(self, tenant)
    }

    /// Returns the feed distribution outbox DAL scoped to one tenant.
    pub fn feed_outbox<'a>(&'a self, tenant: &'a TenantId) -> FeedOutboxDAL<'a> {
        FeedOutboxDAL::new(self, tenant)
    }
}
