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

//! # Haven Storage
//!
//! Transactional work-queue storage for a multi-tenant identity host, built
//! on an embedded SQLite store. Three queues share one leasing protocol:
//!
//! - **Outbox**: outgoing deliveries, checked out one at a time by priority
//!   and schedule, with per-recipient dependency gating between files.
//! - **Inbox**: incoming work partitioned into boxes, popped in insertion
//!   order as leased batches.
//! - **Feed outbox**: feed records awaiting fan-out, popped in insertion
//!   order as leased batches.
//!
//! ## Leasing
//!
//! Every checkout or pop stamps the affected rows with a fresh time-ordered
//! [`LeaseToken`] inside a single transaction, so concurrent workers can
//! never receive the same item. Workers finish a lease by committing
//! (delete) or cancelling (release); abandoned leases are swept back to
//! availability by comparing the timestamp embedded in the token.
//!
//! ## Tenancy
//!
//! Every operation is scoped to a validated [`TenantId`]. Rows of different
//! tenants never interact, including dependency checks and sweeps.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use haven_storage::{Database, NewOutboxItem, TenantId, DAL};
//!
//! let database = Database::new("haven.db");
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//!
//! let tenant = TenantId::new("alice.example.com")?;
//! dal.outbox(&tenant).insert(item).await?;
//! if let Some(item) = dal.outbox(&tenant).checkout_next_item().await? {
//!     // deliver, then:
//!     dal.outbox(&tenant).complete_and_remove(item.checkout_stamp.unwrap()).await?;
//! }
//! ```

pub mod dal;
pub mod database;
pub mod error;
pub mod models;
pub mod tenant;

pub use dal::{FeedOutboxDAL, InboxDAL, OutboxDAL, DAL};
pub use database::{Database, LeaseToken};
pub use error::{StorageError, MAX_VALUE_BYTES};
pub use models::{
    FeedOutboxItem, FeedOutboxStatus, InboxItem, InboxStatus, NewFeedOutboxItem, NewInboxItem,
    NewOutboxItem, OutboxItem, OutboxStatus,
};
pub use tenant::TenantId;
