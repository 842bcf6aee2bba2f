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

//! Feed Distribution Outbox Models
//!
//! Domain types for the feed-fanout queue: the same pop/commit shape as the
//! inbox, keyed by `(file_id, drive_id, recipient)` instead of a box id, and
//! with no partition filter beyond the tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::LeaseToken;

/// One pending feed-fanout delivery, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOutboxItem {
    pub file_id: Uuid,
    pub drive_id: Uuid,
    pub recipient: String,
    /// Opaque payload.
    pub value: Option<Vec<u8>>,
    /// Current pop lease, when checked out.
    pub pop_stamp: Option<LeaseToken>,
    pub created: DateTime<Utc>,
    pub modified: Option<DateTime<Utc>>,
}

/// A new feed-fanout item to enqueue.
#[derive(Debug, Clone)]
pub struct NewFeedOutboxItem {
    pub file_id: Uuid,
    pub drive_id: Uuid,
    pub recipient: String,
    pub value: Option<Vec<u8>>,
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOutboxStatus {
    pub total_items: i64,
    pub popped_items: i64,
    /// Insertion time of the oldest available row.
    pub oldest_item_time: Option<DateTime<Utc>>,
}
