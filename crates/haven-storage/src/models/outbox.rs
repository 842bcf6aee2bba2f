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

//! Outbox Models
//!
//! Domain types for the outgoing work queue: one item per pending transfer
//! of a file to a recipient, with priority ordering, retry scheduling, and
//! optional dependency gating on a sibling item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::LeaseToken;

/// One unit of outgoing work, as stored.
///
/// An item with `checkout_stamp = None` is available (subject to
/// `next_run_time` and dependency gating); `Some` means a worker holds the
/// lease. Rows are deleted on completion, so presence in the table means the
/// work is still pending or in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
    /// Drive the file lives on.
    pub drive_id: Uuid,
    /// File being sent; `(drive_id, file_id, recipient)` identifies the item
    /// within its tenant.
    pub file_id: Uuid,
    /// Destination of the transfer.
    pub recipient: String,
    /// Ascending selection order; lower runs first.
    pub priority: i32,
    /// Item this one may not overtake: while a row with this `file_id` and
    /// the same `recipient` exists, this item is not eligible for checkout.
    pub dependency_file_id: Option<Uuid>,
    /// Times the item has been leased and returned without completing.
    pub checkout_count: i32,
    /// Earliest instant the item is eligible for checkout.
    pub next_run_time: DateTime<Utc>,
    /// Opaque payload.
    pub value: Option<Vec<u8>>,
    /// Current lease, when checked out.
    pub checkout_stamp: Option<LeaseToken>,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
}

/// A new outbox item to enqueue.
#[derive(Debug, Clone)]
pub struct NewOutboxItem {
    pub drive_id: Uuid,
    pub file_id: Uuid,
    pub recipient: String,
    pub priority: i32,
    pub dependency_file_id: Option<Uuid>,
    /// Defaults to the enqueue instant when `None`.
    pub next_run_time: Option<DateTime<Utc>>,
    pub value: Option<Vec<u8>>,
}

/// Point-in-time queue counters, globally or per drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStatus {
    /// Rows in the queue, leased or not.
    pub total_items: i64,
    /// Rows currently holding a lease.
    pub checked_out_items: i64,
    /// Earliest `next_run_time` among available rows; `None` when no row is
    /// available. Callers use this to arm a wake-up timer.
    pub next_run_time: Option<DateTime<Utc>>,
}
