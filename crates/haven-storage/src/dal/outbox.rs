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

//! Outbox DAL: the priority + dependency checkout queue.
//!
//! Checkout is a single UPDATE whose target row is computed by a correlated
//! subquery, followed by reading back the row that received the fresh lease
//! token. The statement runs inside an immediate (write-locking) transaction,
//! so concurrent workers can never stamp the same row.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Binary, Text};
use tracing::debug;
use uuid::Uuid;

use super::models::{
    current_timestamp_ms, datetime_to_ms, ms_to_datetime, uuid_to_blob, NewSqliteOutboxRow,
    SqliteOutboxRow,
};
use super::DAL;
use crate::database::schema::outbox;
use crate::database::LeaseToken;
use crate::error::{StorageError, MAX_VALUE_BYTES};
use crate::models::{NewOutboxItem, OutboxItem, OutboxStatus};
use crate::tenant::TenantId;

/// Stamps the single best eligible row with a fresh lease token.
///
/// Eligibility: available, due, and either no dependency or no row in this
/// tenant still carries the depended-on file id for the same recipient.
/// Selection: lowest priority first, ties broken by earliest next_run_time.
const CHECKOUT_SQL: &str = "\
    UPDATE outbox SET checkout_stamp = ? \
    WHERE rowid = ( \
        SELECT o.rowid FROM outbox AS o \
        WHERE o.identity = ? \
          AND o.checkout_stamp IS NULL \
          AND o.next_run_time <= ? \
          AND (o.dependency_file_id IS NULL OR NOT EXISTS ( \
              SELECT 1 FROM outbox AS d \
              WHERE d.identity = o.identity \
                AND d.file_id = o.dependency_file_id \
                AND d.recipient = o.recipient)) \
        ORDER BY o.priority ASC, o.next_run_time ASC \
        LIMIT 1)";

/// Data access layer for the outbox queue of one tenant.
#[derive(Clone)]
pub struct OutboxDAL<'a> {
    dal: &'a DAL,
    tenant: &'a TenantId,
}

impl<'a> OutboxDAL<'a> {
    /// Creates a new OutboxDAL instance scoped to `tenant`.
    pub fn new(dal: &'a DAL, tenant: &'a TenantId) -> Self {
        Self { dal, tenant }
    }

    /// Validates a new item and marshals it to its row form.
    ///
    /// Runs before any I/O: a self-dependency or oversized payload never
    /// reaches the store.
    fn validate(&self, item: NewOutboxItem) -> Result<NewSqliteOutboxRow, StorageError> {
        if item.dependency_file_id == Some(item.file_id) {
            return Err(StorageError::SelfDependency(item.file_id));
        }
        if let Some(value) = &item.value {
            if value.len() > MAX_VALUE_BYTES {
                return Err(StorageError::PayloadTooLarge {
                    size: value.len(),
                    max: MAX_VALUE_BYTES,
                });
            }
        }

        let now = current_timestamp_ms();
        Ok(NewSqliteOutboxRow {
            identity: self.tenant.as_str().to_string(),
            drive_id: uuid_to_blob(&item.drive_id),
            file_id: uuid_to_blob(&item.file_id),
            recipient: item.recipient,
            priority: item.priority,
            dependency_file_id: item.dependency_file_id.map(|u| uuid_to_blob(&u)),
            checkout_count: 0,
            next_run_time: item.next_run_time.map(|t| datetime_to_ms(&t)).unwrap_or(now),
            value: item.value,
            created: now,
        })
    }

    /// Enqueues a new item. Fails on a duplicate key.
    pub async fn insert(&self, item: NewOutboxItem) -> Result<(), StorageError> {
        let row = self.validate(item)?;
        let conn = self.dal.database().get_connection().await?;

        conn.interact(move |conn| {
            diesel::insert_into(outbox::table)
                .values(&row)
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Enqueues a new item, or refreshes an existing one in place.
    ///
    /// A conflicting upsert updates payload, priority, dependency, schedule
    /// and `modified`; a live lease and the retry counter survive untouched,
    /// so an in-flight worker's claim is not disturbed.
    pub async fn upsert(&self, item: NewOutboxItem) -> Result<(), StorageError> {
        use diesel::upsert::excluded;

        let row = self.validate(item)?;
        let now = current_timestamp_ms();
        let conn = self.dal.database().get_connection().await?;

        conn.interact(move |conn| {
            diesel::insert_into(outbox::table)
                .values(&row)
                .on_conflict((
                    outbox::identity,
                    outbox::drive_id,
                    outbox::file_id,
                    outbox::recipient,
                ))
                .do_update()
                .set((
                    outbox::priority.eq(excluded(outbox::priority)),
                    outbox::dependency_file_id.eq(excluded(outbox::dependency_file_id)),
                    outbox::next_run_time.eq(excluded(outbox::next_run_time)),
                    outbox::value.eq(excluded(outbox::value)),
                    outbox::modified.eq(Some(now)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Enqueues a batch of items in one atomic unit: all rows land or none.
    pub async fn insert_batch(&self, items: Vec<NewOutboxItem>) -> Result<(), StorageError> {
        let rows = items
            .into_iter()
            .map(|item| self.validate(item))
            .collect::<Result<Vec<_>, _>>()?;
        if rows.is_empty() {
            return Ok(());
        }

        let conn = self.dal.database().get_connection().await?;
        conn.interact(move |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::insert_into(outbox::table)
                    .values(&rows)
                    .execute(conn)
            })
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Retrieves one item by its full key, if present.
    pub async fn get(
        &self,
        drive_id: Uuid,
        file_id: Uuid,
        recipient: &str,
    ) -> Result<Option<OutboxItem>, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let drive_blob = uuid_to_blob(&drive_id);
        let file_blob = uuid_to_blob(&file_id);
        let recipient = recipient.to_string();
        let conn = self.dal.database().get_connection().await?;

        let row: Option<SqliteOutboxRow> = conn
            .interact(move |conn| {
                outbox::table
                    .filter(outbox::identity.eq(identity))
                    .filter(outbox::drive_id.eq(drive_blob))
                    .filter(outbox::file_id.eq(file_blob))
                    .filter(outbox::recipient.eq(recipient))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(row.map(Into::into))
    }

    /// Deletes one item by its full key, leased or not.
    pub async fn remove(
        &self,
        drive_id: Uuid,
        file_id: Uuid,
        recipient: &str,
    ) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let drive_blob = uuid_to_blob(&drive_id);
        let file_blob = uuid_to_blob(&file_id);
        let recipient = recipient.to_string();
        let conn = self.dal.database().get_connection().await?;

        let deleted = conn
            .interact(move |conn| {
                diesel::delete(
                    outbox::table
                        .filter(outbox::identity.eq(identity))
                        .filter(outbox::drive_id.eq(drive_blob))
                        .filter(outbox::file_id.eq(file_blob))
                        .filter(outbox::recipient.eq(recipient)),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(deleted)
    }

    /// Atomically checks out the next eligible item, if any.
    ///
    /// Returns `None` when no row is available, due, and dependency-clear.
    /// The returned item carries the freshly assigned lease token in
    /// `checkout_stamp`.
    pub async fn checkout_next_item(&self) -> Result<Option<OutboxItem>, StorageError> {
        let token = LeaseToken::generate();
        let identity = self.tenant.as_str().to_string();
        let now = current_timestamp_ms();
        let conn = self.dal.database().get_connection().await?;

        let row: Option<SqliteOutboxRow> = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                    let stamped = diesel::sql_query(CHECKOUT_SQL)
                        .bind::<Binary, _>(token.to_vec())
                        .bind::<Text, _>(identity.clone())
                        .bind::<BigInt, _>(now)
                        .execute(conn)?;

                    if stamped == 0 {
                        return Ok(None);
                    }

                    outbox::table
                        .filter(outbox::identity.eq(identity))
                        .filter(outbox::checkout_stamp.eq(token.to_vec()))
                        .first(conn)
                        .optional()
                })
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if let Some(row) = &row {
            debug!(
                tenant = %self.tenant,
                token = %token,
                checkout_count = row.checkout_count,
                "checked out outbox item"
            );
        }

        Ok(row.map(Into::into))
    }

    /// Earliest `next_run_time` among available items, or `None` when the
    /// queue holds no available work. Used by callers to arm a wake-up timer.
    pub async fn next_scheduled_time(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let next: Option<i64> = conn
            .interact(move |conn| {
                outbox::table
                    .filter(outbox::identity.eq(identity))
                    .filter(outbox::checkout_stamp.is_null())
                    .select(diesel::dsl::min(outbox::next_run_time))
                    .first(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(next.map(ms_to_datetime))
    }

    /// Returns leased items to availability: clears the lease, bumps the
    /// retry counter, and sets the caller-supplied schedule.
    ///
    /// A stale or unknown token affects zero rows.
    pub async fn check_in_cancelled(
        &self,
        token: LeaseToken,
        next_run_time: DateTime<Utc>,
    ) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let next_ms = datetime_to_ms(&next_run_time);
        let conn = self.dal.database().get_connection().await?;

        let returned = conn
            .interact(move |conn| {
                diesel::update(
                    outbox::table
                        .filter(outbox::identity.eq(identity))
                        .filter(outbox::checkout_stamp.eq(token.to_vec())),
                )
                .set((
                    outbox::checkout_stamp.eq(None::<Vec<u8>>),
                    outbox::checkout_count.eq(outbox::checkout_count + 1),
                    outbox::next_run_time.eq(next_ms),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(tenant = %self.tenant, token = %token, returned, "cancelled outbox checkout");
        Ok(returned)
    }

    /// Permanently removes the items holding this lease token.
    pub async fn complete_and_remove(&self, token: LeaseToken) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let conn = self.dal.database().get_connection().await?;

        let removed = conn
            .interact(move |conn| {
                diesel::delete(
                    outbox::table
                        .filter(outbox::identity.eq(identity))
                        .filter(outbox::checkout_stamp.eq(token.to_vec())),
                )
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        debug!(tenant = %self.tenant, token = %token, removed, "completed outbox items");
        Ok(removed)
    }

    /// Recovers items abandoned by crashed workers: clears every lease whose
    /// token was created before `older_than` and bumps the retry counter.
    ///
    /// `next_run_time` is left alone, so recovered items resume at their
    /// previous schedule. Running the sweep again before a new lease is a
    /// zero-row no-op.
    pub async fn recover_dead(&self, older_than: DateTime<Utc>) -> Result<usize, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let boundary = LeaseToken::time_boundary(older_than).to_vec();
        let conn = self.dal.database().get_connection().await?;

        let recovered = conn
            .interact(move |conn| {
                diesel::update(
                    outbox::table
                        .filter(outbox::identity.eq(identity))
                        .filter(outbox::checkout_stamp.is_not_null())
                        .filter(outbox::checkout_stamp.lt(boundary)),
                )
                .set((
                    outbox::checkout_stamp.eq(None::<Vec<u8>>),
                    outbox::checkout_count.eq(outbox::checkout_count + 1),
                ))
                .execute(conn)
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        if recovered > 0 {
            tracing::info!(tenant = %self.tenant, recovered, "recovered dead outbox leases");
        }
        Ok(recovered)
    }

    /// Queue counters across all drives of this tenant.
    pub async fn status(&self) -> Result<OutboxStatus, StorageError> {
        self.status_inner(None).await
    }

    /// Queue counters for one drive.
    pub async fn status_drive(&self, drive_id: Uuid) -> Result<OutboxStatus, StorageError> {
        self.status_inner(Some(drive_id)).await
    }

    async fn status_inner(&self, drive_id: Option<Uuid>) -> Result<OutboxStatus, StorageError> {
        let identity = self.tenant.as_str().to_string();
        let drive_blob = drive_id.map(|d| uuid_to_blob(&d));
        let conn = self.dal.database().get_connection().await?;

        let (total, checked_out, next_ms): (i64, i64, Option<i64>) = conn
            .interact(move |conn| {
                let mut total_q = outbox::table
                    .filter(outbox::identity.eq(&identity))
                    .into_boxed();
                let mut out_q = outbox::table
                    .filter(outbox::identity.eq(&identity))
                    .filter(outbox::checkout_stamp.is_not_null())
                    .into_boxed();
                let mut next_q = outbox::table
                    .filter(outbox::identity.eq(&identity))
                    .filter(outbox::checkout_stamp.is_null())
                    .into_boxed();

                if let Some(drive) = &drive_blob {
                    total_q = total_q.filter(outbox::drive_id.eq(drive.clone()));
                    out_q = out_q.filter(outbox::drive_id.eq(drive.clone()));
                    next_q = next_q.filter(outbox::drive_id.eq(drive.clone()));
                }

                let total: i64 = total_q.count().get_result(conn)?;
                let checked_out: i64 = out_q.count().get_result(conn)?;
                let next: Option<i64> = next_q
                    .select(diesel::dsl::min(outbox::next_run_time))
                    .first(conn)?;
                Ok::<_, diesel::result::Error>((total, checked_out, next))
            })
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        Ok(OutboxStatus {
            total_items: total,
            checked_out_items: checked_out,
            next_run_time: next_ms.map(ms_to_datetime),
        })
    }
}
