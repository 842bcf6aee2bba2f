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

//! Inbox DAL: per-box batched leased pops.
//!
//! A pop stamps up to `count` of the oldest available rows in one box with a
//! fresh token in a single UPDATE, then reads back exactly the stamped rows.
//! Unlike the outbox, cancelling a pop does not advance any retry counter;
//! inbox items are step-based, not backoff-retried.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Binary, Text};
use tracing::debug;
use uuid::Uuid;

use super::models::{
    current_timestamp_ms, ms_to_datetime, uuid_to_blob, NewSqliteInboxRow, SqliteInboxRow,
};
use super::DAL;
use crate::database::schema::inbox;
use crate::database::LeaseToken;
use crate::error::{StorageError, MAX_VALUE_BYTES};
use crate::models::{InboxItem, InboxStatus, NewInboxItem};
use crate::tenant::TenantId;

/// Stamps up to `count` oldest available rows of one box with a pop token.
/// Insertion order, not priority: `rowid` is the durable record of it.
const POP_SQL: &str = "\
    UPDATE inbox SET pop_stamp = ? \
    WHERE rowid IN ( \
        SELECT rowid FROM inbox \
        WHERE identity = ? AND box_id = ? AND pop_stamp IS NULL \
        ORDER BY rowid ASC \
        LIMIT ?)";

/// Data access layer for the inbox queue of one tenant.
#[derive(Clone)]
pub struct InboxDAL<'a> {
    dal: &'a DAL,
    tenant: &'a TenantId,
}

impl<'a> InboxDAL<'a> {
    /// Creates a new InboxDAL instance scoped to `tenant`.
    pub fn new(dal: &'a DAL, tenant: &'a TenantId) -> Self {
        Self { dal, tenant }
    }

    fn validate(&self, item: NewInboxItem) -> Result<NewSqliteInboxRow, StorageError> {
        if let Some(value) = &item.value {
            if value.len() > MAX_VALUE_BYTES {
                return Err(StorageError::PayloadTooLarge {
                    size: value.len(),
                    max: MAX_VALUE_BYTES,
                });
            }
        }

        Ok(NewSqliteInboxRow {
            identity: self.tenant.as_str().to_string(),
            file_id: uuid_to_blob(&item.file_id),
            box_id: uuid_to_blob(&item.box_id),
            priority: item.priority,
            value: item.value,
            created: current_timestamp_ms(),
        })
    }

    /// Enqueues a new item. Fails on a duplicate file id.
    pub async fn insert(&self, item: NewInboxItem) -> Result<(), StorageError> {
        let row = self.validate(item)?;
        let conn = self.dal.database().get_connection().await?;

        conn.interact(move |conn| diesel::insert_into(inbox::table).values(&row).execute(conn))
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Enqueues a new item, or refreshes an existing one in place. A live
    /// pop stamp survives the refresh.
    pub async fn upsert(&self, item: NewInboxItem) -> Result<(), StorageError> {
        use diesel::upsert::excluded;

        let row = self.validate(item)?;
        let now = current_timestamp_ms();
        let conn = self.dal.database().get_connection().await?;

        conn.interact(move |conn| {
            diesel::insert_into(inbox::table)
                .values(&row)
                .on_conflict((inbox::identity, inbox::file_id))
                .do_update()
                .set((
                    inbox::box_id.eq(excluded(inbox::box_id)),
                    inbox::priority.eq(excluded(inbox::priority)),
                    inbox::value.eq(excluded(inbox::value)),
                    inbox::modified.eq(Some(now)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Retrieves one item by file id, if present.
    pub async fn get(&self, file_id: Uuid) -> Result<Option<InboxItem>, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let file_blob = uuid_to_blob(&file_id);
        let conn = self.dal.database().get_connection().await?;

        let row: Option<SqliteInboxRow> = conn
            .interact(move |conn| {
                inbox::table
                    .filter(inbox::identity.eq(identity))
                    .filter(inbox::file_id.eq(file_blob))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(row.map(Into::into))
    }

    /// Deletes one item by file id, popped or not.
    pub async fn remove(&self, file_id: Uuid) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let file_blob = uuid_to_blob(&file_id);
        let conn = self.dal.database().get_connection().await?;

        let deleted = conn
            .interact(move |conn| {
                diesel::delete(
                    inbox::table
                        .filter(inbox::identity.eq(identity))
                        .filter(inbox::file_id.eq(file_blob)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(deleted)
    }

    /// Atomically leases up to `count` oldest available items in `box_id`.
    ///
    /// Returned items carry the fresh pop stamp; an empty result means the
    /// box has no available work. No dependency gating applies here.
    pub async fn pop_specific_box(
        &self,
        box_id: Uuid,
        count: usize,
    ) -> Result<Vec<InboxItem>, StorageError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let token = LeaseToken::generate();
        let identity = self.tenant.as_str().to_string();
        let box_blob = uuid_to_blob(&box_id);
        let limit = count as i64;
        let conn = self.dal.database().get_connection().await?;

        let rows: Vec<SqliteInboxRow> = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                    let stamped = diesel::sql_query(POP_SQL)
                        .bind::<Binary, _>(token.to_vec())
                        .bind::<Text, _>(identity.clone())
                        .bind::<Binary, _>(box_blob)
                        .bind::<BigInt, _>(limit)
                        .execute(conn)?;

                    if stamped == 0 {
                        return Ok(Vec::new());
                    }

                    inbox::table
                        .filter(inbox::identity.eq(identity))
                        .filter(inbox::pop_stamp.eq(token.to_vec()))
                        .order(inbox::row_id.asc())
                        .load(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(
            tenant = %self.tenant,
            token = %token,
            popped = rows.len(),
            "popped inbox items"
        );

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Releases every item under this pop stamp back to availability.
    pub async fn pop_cancel_all(&self, token: LeaseToken) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let returned = conn
            .interact(move |conn| {
                diesel::update(
                    inbox::table
                        .filter(inbox::identity.eq(identity))
                        .filter(inbox::pop_stamp.eq(token.to_vec())),
                )
                .set(inbox::pop_stamp.eq(None::<Vec<u8>>))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(tenant = %self.tenant, token = %token, returned, "cancelled inbox pop");
        Ok(returned)
    }

    /// Releases the listed items under this pop stamp; the rest of the batch
    /// stays leased. All-or-nothing within one atomic unit.
    pub async fn pop_cancel_list(
        &self,
        token: LeaseToken,
        file_ids: &[Uuid],
    ) -> Result<usize, StorageError> {
        if file_ids.is_empty() {
            return Ok(0);
        }

        let identity = self.tenant.as_str().to_string();
        let file_blobs: Vec<Vec<u8>> = file_ids.iter().map(uuid_to_blob).collect();
        let conn = self.dal.database().get_connection().await?;

        let returned = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    diesel::update(
                        inbox::table
                            .filter(inbox::identity.eq(identity))
                            .filter(inbox::pop_stamp.eq(token.to_vec()))
                            .filter(inbox::file_id.eq_any(file_blobs)),
                    )
                    .set(inbox::pop_stamp.eq(None::<Vec<u8>>))
                    .execute(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(returned)
    }

    /// Permanently removes every item under this pop stamp.
    pub async fn pop_commit_all(&self, token: LeaseToken) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let removed = conn
            .interact(move |conn| {
                diesel::delete(
                    inbox::table
                        .filter(inbox::identity.eq(identity))
                        .filter(inbox::pop_stamp.eq(token.to_vec())),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(tenant = %self.tenant, token = %token, removed, "committed inbox pop");
        Ok(removed)
    }

    /// Permanently removes the listed items under this pop stamp.
    /// All-or-nothing within one atomic unit.
    pub async fn pop_commit_list(
        &self,
        token: LeaseToken,
        file_ids: &[Uuid],
    ) -> Result<usize, StorageError> {
        if file_ids.is_empty() {
            return Ok(0);
        }

        let identity = self.tenant.as_str().to_string();
        let file_blobs: Vec<Vec<u8>> = file_ids.iter().map(uuid_to_blob).collect();
        let conn = self.dal.database().get_connection().await?;

        let removed = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    diesel::delete(
                        inbox::table
                            .filter(inbox::identity.eq(identity))
                            .filter(inbox::pop_stamp.eq(token.to_vec()))
                            .filter(inbox::file_id.eq_any(file_blobs)),
                    )
                    .execute(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    /// Clears pop stamps created before `older_than`, returning abandoned
    /// items to availability.
    pub async fn pop_recover_dead(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let boundary = LeaseToken::time_boundary(older_than).to_vec();
        let conn = self.dal.database().get_connection().await?;

        let recovered = conn
            .interact(move |conn| {
                diesel::update(
                    inbox::table
                        .filter(inbox::identity.eq(identity))
                        .filter(inbox::pop_stamp.is_not_null())
                        .filter(inbox::pop_stamp.lt(boundary)),
                )
                .set(inbox::pop_stamp.eq(None::<Vec<u8>>))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if recovered > 0 {
            tracing::info!(tenant = %self.tenant, recovered, "recovered dead inbox pops");
        }
        Ok(recovered)
    }

    /// Queue counters across all boxes of this tenant.
    pub async fn pop_status(&self) -> Result<InboxStatus, StorageError> {
        self.status_inner(None).await
    }

    /// Queue counters for one box.
    pub async fn pop_status_specific_box(&self, box_id: Uuid) -> Result<InboxStatus, StorageError> {
        self.status_inner(Some(box_id)).await
    }

    async fn status_inner(&self, box_id: Option<Uuid>) -> Result<InboxStatus, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let box_blob = box_id.map(|b| uuid_to_blob(&b));
        let conn = self.dal.database().get_connection().await?;

        let (total, popped, oldest_ms): (i64, i64, Option<i64>) = conn
            .interact(move |conn| {
                let mut total_q = inbox::table
                    .filter(inbox::identity.eq(&identity))
                    .into_boxed();
                let mut popped_q = inbox::table
                    .filter(inbox::identity.eq(&identity))
                    .filter(inbox::pop_stamp.is_not_null())
                    .into_boxed();
                let mut oldest_q = inbox::table
                    .filter(inbox::identity.eq(&identity))
                    .filter(inbox::pop_stamp.is_null())
                    .into_boxed();

                if let Some(b) = &box_blob {
                    total_q = total_q.filter(inbox::box_id.eq(b.clone()));
                    popped_q = popped_q.filter(inbox::box_id.eq(b.clone()));
                    oldest_q = oldest_q.filter(inbox::box_id.eq(b.clone()));
                }

                let total: i64 = total_q.count().get_result(conn)?;
                let popped: i64 = popped_q.count().get_result(conn)?;
                let oldest: Option<i64> = oldest_q
                    .select(diesel::dsl::min(inbox::created))
                    .first(conn)?;
                Ok::<_, diesel::result::Error>((total, popped, oldest))
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(InboxStatus {
            total_items: total,
            popped_items: popped,
            oldest_item_time: oldest_ms.map(ms_to_datetime),
        })
    }
}
