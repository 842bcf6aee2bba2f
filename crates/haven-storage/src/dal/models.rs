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

//! SQLite row models for the queue tables.
//!
//! UUIDs are stored as BLOB (`Vec<u8>`), timestamps as unix milliseconds
//! (`i64`), lease tokens as 16-byte UUIDv7 BLOBs. These structs are internal
//! to the DAL and converted to/from domain types at its boundary.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::database::schema::{feed_outbox, inbox, outbox};
use crate::database::LeaseToken;
use crate::models::{FeedOutboxItem, InboxItem, OutboxItem};

// ============================================================================
// Outbox Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteOutboxRow {
    pub identity: String,
    pub drive_id: Vec<u8>,
    pub file_id: Vec<u8>,
    pub recipient: String,
    pub priority: i32,
    pub dependency_file_id: Option<Vec<u8>>,
    pub checkout_count: i32,
    pub next_run_time: i64,
    pub value: Option<Vec<u8>>,
    pub checkout_stamp: Option<Vec<u8>>,
    pub created: i64,
    pub modified: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox)]
pub struct NewSqliteOutboxRow {
    pub identity: String,
    pub drive_id: Vec<u8>,
    pub file_id: Vec<u8>,
    pub recipient: String,
    pub priority: i32,
    pub dependency_file_id: Option<Vec<u8>>,
    pub checkout_count: i32,
    pub next_run_time: i64,
    pub value: Option<Vec<u8>>,
    pub created: i64,
}

// ============================================================================
// Inbox Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = inbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteInboxRow {
    pub row_id: i64,
    pub identity: String,
    pub file_id: Vec<u8>,
    pub box_id: Vec<u8>,
    pub priority: i32,
    pub value: Option<Vec<u8>>,
    pub pop_stamp: Option<Vec<u8>>,
    pub created: i64,
    pub modified: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = inbox)]
pub struct NewSqliteInboxRow {
    pub identity: String,
    pub file_id: Vec<u8>,
    pub box_id: Vec<u8>,
    pub priority: i32,
    pub value: Option<Vec<u8>>,
    pub created: i64,
}

// ============================================================================
// Feed Distribution Outbox Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = feed_outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteFeedOutboxRow {
    pub row_id: i64,
    pub identity: String,
    pub file_id: Vec<u8>,
    pub drive_id: Vec<u8>,
    pub recipient: String,
    pub value: Option<Vec<u8>>,
    pub pop_stamp: Option<Vec<u8>>,
    pub created: i64,
    pub modified: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = feed_outbox)]
pub struct NewSqliteFeedOutboxRow {
    pub identity: String,
    pub file_id: Vec<u8>,
    pub drive_id: Vec<u8>,
    pub recipient: String,
    pub value: Option<Vec<u8>>,
    pub created: i64,
}

// ============================================================================
// Conversion Utilities
// ============================================================================

/// Convert a UUID to SQLite BLOB format (Vec<u8>)
pub fn uuid_to_blob(uuid: &Uuid) -> Vec<u8> {
    uuid.as_bytes().to_vec()
}

/// Convert SQLite BLOB to UUID
pub fn blob_to_uuid(blob: &[u8]) -> Result<Uuid, uuid::Error> {
    Uuid::from_slice(blob)
}

/// Convert DateTime<Utc> to unix milliseconds for SQLite storage
pub fn datetime_to_ms(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert unix milliseconds from SQLite to DateTime<Utc>
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).expect("Invalid timestamp in database")
}

/// Current timestamp as unix milliseconds
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn blob_to_lease(blob: &[u8]) -> LeaseToken {
    LeaseToken::from_bytes(blob).expect("Invalid lease token in database")
}

// ============================================================================
// Conversion Implementations: SQLite rows <-> Domain models
// ============================================================================

impl From<SqliteOutboxRow> for OutboxItem {
    fn from(s: SqliteOutboxRow) -> Self {
        OutboxItem {
            drive_id: blob_to_uuid(&s.drive_id).expect("Invalid UUID in database"),
            file_id: blob_to_uuid(&s.file_id).expect("Invalid UUID in database"),
            recipient: s.recipient,
            priority: s.priority,
            dependency_file_id: s
                .dependency_file_id
                .map(|b| blob_to_uuid(&b).expect("Invalid UUID in database")),
            checkout_count: s.checkout_count,
            next_run_time: ms_to_datetime(s.next_run_time),
            value: s.value,
            checkout_stamp: s.checkout_stamp.map(|b| blob_to_lease(&b)),
            created: ms_to_datetime(s.created),
            modified: s.modified.map(ms_to_datetime),
        }
    }
}

impl From<SqliteInboxRow> for InboxItem {
    fn from(s: SqliteInboxRow) -> Self {
        InboxItem {
            file_id: blob_to_uuid(&s.file_id).expect("Invalid UUID in database"),
            box_id: blob_to_uuid(&s.box_id).expect("Invalid UUID in database"),
            priority: s.priority,
            value: s.value,
            pop_stamp: s.pop_stamp.map(|b| blob_to_lease(&b)),
            created: ms_to_datetime(s.created),
            modified: s.modified.map(ms_to_datetime),
        }
    }
}

impl From<SqliteFeedOutboxRow> for FeedOutboxItem {
    fn from(s: SqliteFeedOutboxRow) -> Self {
        FeedOutboxItem {
            file_id: blob_to_uuid(&s.file_id).expect("Invalid UUID in database"),
            drive_id: blob_to_uuid(&s.drive_id).expect("Invalid UUID in database"),
            recipient: s.recipient,
            value: s.value,
            pop_stamp: s.pop_stamp.map(|b| blob_to_lease(&b)),
            created: ms_to_datetime(s.created),
            modified: s.modified.map(ms_to_datetime),
        }
    }
}
