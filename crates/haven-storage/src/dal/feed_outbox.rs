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

//! Feed distribution outbox DAL.
//!
//! Same batched leased-pop protocol as the inbox, without box partitioning:
//! one flat per-tenant queue of feed records awaiting fan-out, consumed in
//! insertion order.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Binary, Text};
use tracing::debug;
use uuid::Uuid;

use super::models::{
    current_timestamp_ms, ms_to_datetime, uuid_to_blob, NewSqliteFeedOutboxRow,
    SqliteFeedOutboxRow,
};
use super::DAL;
use crate::database::schema::feed_outbox;
use crate::database::LeaseToken;
use crate::error::{StorageError, MAX_VALUE_BYTES};
use crate::models::{FeedOutboxItem, FeedOutboxStatus, NewFeedOutboxItem};
use crate::tenant::TenantId;

const POP_SQL: &str = "\
    UPDATE feed_outbox SET pop_stamp = ? \
    WHERE rowid IN ( \
        SELECT rowid FROM feed_outbox \
        WHERE identity = ? AND pop_stamp IS NULL \
        ORDER BY rowid ASC \
        LIMIT ?)";

/// Data access layer for the feed distribution queue of one tenant.
#[derive(Clone)]
pub struct FeedOutboxDAL<'a> {
    dal: &'a DAL,
    tenant: &'a TenantId,
}

impl<'a> FeedOutboxDAL<'a> {
    /// Creates a new FeedOutboxDAL instance scoped to `tenant`.
    pub fn new(dal: &'a DAL, tenant: &'a TenantId) -> Self {
        Self { dal, tenant }
    }

    fn validate(&self, item: NewFeedOutboxItem) -> Result<NewSqliteFeedOutboxRow, StorageError> {
        if let Some(value) = &item.value {
            if value.len() > MAX_VALUE_BYTES {
                return Err(StorageError::PayloadTooLarge {
                    size: value.len(),
                    max: MAX_VALUE_BYTES,
                });
            }
        }

        Ok(NewSqliteFeedOutboxRow {
            identity: self.tenant.as_str().to_string(),
            file_id: uuid_to_blob(&item.file_id),
            drive_id: uuid_to_blob(&item.drive_id),
            recipient: item.recipient,
            value: item.value,
            created: current_timestamp_ms(),
        })
    }

    /// Enqueues one feed record for distribution.
    pub async fn insert(&self, item: NewFeedOutboxItem) -> Result<(), StorageError> {
        let row = self.validate(item)?;
        let conn = self.dal.database().get_connection().await?;

        conn.interact(move |conn| {
            diesel::insert_into(feed_outbox::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Atomically leases up to `count` oldest available records.
    pub async fn pop(&self, count: usize) -> Result<Vec<FeedOutboxItem>, StorageError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let token = LeaseToken::generate();
        let identity = self.tenant.as_str().to_string();
        let limit = count as i64;
        let conn = self.dal.database().get_connection().await?;

        let rows: Vec<SqliteFeedOutboxRow> = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                    let stamped = diesel::sql_query(POP_SQL)
                        .bind::<Binary, _>(token.to_vec())
                        .bind::<Text, _>(identity.clone())
                        .bind::<BigInt, _>(limit)
                        .execute(conn)?;

                    if stamped == 0 {
                        return Ok(Vec::new());
                    }

                    feed_outbox::table
                        .filter(feed_outbox::identity.eq(identity))
                        .filter(feed_outbox::pop_stamp.eq(token.to_vec()))
                        .order(feed_outbox::row_id.asc())
                        .load(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(
            tenant = %self.tenant,
            token = %token,
            popped = rows.len(),
            "popped feed outbox items"
        );

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Releases every record under this pop stamp back to availability.
    pub async fn pop_cancel_all(&self, token: LeaseToken) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let returned = conn
            .interact(move |conn| {
                diesel::update(
                    feed_outbox::table
                        .filter(feed_outbox::identity.eq(identity))
                        .filter(feed_outbox::pop_stamp.eq(token.to_vec())),
                )
                .set(feed_outbox::pop_stamp.eq(None::<Vec<u8>>))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(tenant = %self.tenant, token = %token, returned, "cancelled feed pop");
        Ok(returned)
    }

    /// Releases the listed records under this pop stamp; the rest of the
    /// batch stays leased. All-or-nothing within one atomic unit.
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
                        feed_outbox::table
                            .filter(feed_outbox::identity.eq(identity))
                            .filter(feed_outbox::pop_stamp.eq(token.to_vec()))
                            .filter(feed_outbox::file_id.eq_any(file_blobs)),
                    )
                    .set(feed_outbox::pop_stamp.eq(None::<Vec<u8>>))
                    .execute(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(returned)
    }

    /// Permanently removes every record under this pop stamp.
    pub async fn pop_commit_all(&self, token: LeaseToken) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let removed = conn
            .interact(move |conn| {
                diesel::delete(
                    feed_outbox::table
                        .filter(feed_outbox::identity.eq(identity))
                        .filter(feed_outbox::pop_stamp.eq(token.to_vec())),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(tenant = %self.tenant, token = %token, removed, "committed feed pop");
        Ok(removed)
    }

    /// Permanently removes the listed records under this pop stamp.
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
                        feed_outbox::table
                            .filter(feed_outbox::identity.eq(identity))
                            .filter(feed_outbox::pop_stamp.eq(token.to_vec()))
                            .filter(feed_outbox::file_id.eq_any(file_blobs)),
                    )
                    .execute(conn)
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(removed)
    }

    /// Clears pop stamps created before `older_than`, returning abandoned
    /// records to availability.
    pub async fn pop_recover_dead(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let boundary = LeaseToken::time_boundary(older_than).to_vec();
        let conn = self.dal.database().get_connection().await?;

        let recovered = conn
            .interact(move |conn| {
                diesel::update(
                    feed_outbox::table
                        .filter(feed_outbox::identity.eq(identity))
                        .filter(feed_outbox::pop_stamp.is_not_null())
                        .filter(feed_outbox::pop_stamp.lt(boundary)),
                )
                .set(feed_outbox::pop_stamp.eq(None::<Vec<u8>>))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if recovered > 0 {
            tracing::info!(tenant = %self.tenant, recovered, "recovered dead feed pops");
        }
        Ok(recovered)
    }

    /// Queue counters for this tenant's feed outbox.
    pub async fn pop_status(&self) -> Result<FeedOutboxStatus, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let (total, popped, oldest_ms): (i64, i64, Option<i64>) = conn
            .interact(move |conn| {
                let total: i64 = feed_outbox::table
                    .filter(feed_outbox::identity.eq(&identity))
                    .count()
                    .get_result(conn)?;
                let popped: i64 = feed_outbox::table
                    .filter(feed_outbox::identity.eq(&identity))
                    .filter(feed_outbox::pop_stamp.is_not_null())
                    .count()
                    .get_result(conn)?;
                let oldest: Option<i64> = feed_outbox::table
                    .filter(feed_outbox::identity.eq(&identity))
                    .filter(feed_outbox::pop_stamp.is_null())
                    .select(diesel::dsl::min(feed_outbox::created))
                    .first(conn)?;
                Ok::<_, diesel::result::Error>((total, popped, oldest))
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(FeedOutboxStatus {
            total_items: total,
            popped_items: popped,
            oldest_item_time: oldest_ms.map(ms_to_datetime),
        })
    }
}
