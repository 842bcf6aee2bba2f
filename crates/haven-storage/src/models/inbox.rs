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

//! Inbox Models
//!
//! Domain types for the incoming work queue. Items are partitioned into
//! named boxes (per drive or per app) and consumed in insertion order via
//! batched leased pops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::LeaseToken;

/// One unit of incoming work, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxItem {
    /// Identity of the work unit; unique per tenant.
    pub file_id: Uuid,
    /// Box the item belongs to; pops are filtered by it.
    pub box_id: Uuid,
    /// Informational ordering hint; pops use insertion order, not priority.
    pub priority: i32,
    /// Opaque payload.
    pub value: Option<Vec<u8>>,
    /// Current pop lease, when checked out.
    pub pop_stamp: Option<LeaseToken>,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
}

/// A new inbox item to enqueue.
#[derive(Debug, Clone)]
pub struct NewInboxItem {
    pub file_id: Uuid,
    pub box_id: Uuid,
    pub priority: i32,
    pub value: Option<Vec<u8>>,
}

/// Point-in-time queue counters, globally or for one box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxStatus {
    pub total_items: i64,
    /// Rows currently holding a pop stamp.
    pub popped_items: i64,
    /// Insertion time of the oldest available row; `None` when the box has
    /// no available work.
    pub oldest_item_time: Option<DateTime<Utc>>,
}
