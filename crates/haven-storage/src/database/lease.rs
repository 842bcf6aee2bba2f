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

//! Time-ordered lease tokens.
//!
//! A [`LeaseToken`] marks a queue row as checked out by a worker. Tokens are
//! UUIDv7 values: the top 48 bits are the creation time in unix milliseconds,
//! the rest is counter/random entropy. That gives three properties the queue
//! layer relies on:
//!
//! - tokens are unique across concurrent leasers without coordination;
//! - the creation time is recoverable from the token itself, so dead-lease
//!   recovery needs no separate `leased_at` column;
//! - tokens sort byte-lexicographically by creation time, so "leased before
//!   instant T" is a single BLOB inequality against [`LeaseToken::time_boundary`].
//!
//! Generation goes through a process-wide [`ContextV7`] so tokens created in
//! the same millisecond are still strictly increasing.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::timestamp::context::ContextV7;
use uuid::{Timestamp, Uuid};

/// Shared monotonic context; breaks same-millisecond ties with a counter.
static LEASE_CONTEXT: Lazy<Mutex<ContextV7>> = Lazy::new(|| Mutex::new(ContextV7::new()));

/// A lease (checkout/pop) token assigned to claimed queue rows.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LeaseToken(pub Uuid);

impl LeaseToken {
    /// Generates a fresh token for the current instant.
    ///
    /// Tokens are strictly increasing in generation order process-wide.
    pub fn generate() -> Self {
        Self(Uuid::new_v7(Timestamp::now(
            &*LEASE_CONTEXT.lock().expect("lease context mutex poisoned"),
        )))
    }

    /// Builds the smallest possible token for the given instant.
    ///
    /// Every token generated at or after `at` compares greater than or equal
    /// to the boundary; every token generated in an earlier millisecond
    /// compares strictly less. Used as the right-hand side of BLOB range
    /// predicates in dead-lease recovery.
    pub fn time_boundary(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis().max(0) as u64;
        Self(uuid::Builder::from_unix_timestamp_millis(millis, &[0u8; 10]).into_uuid())
    }

    /// Recovers the creation instant embedded in the token.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let ts = self
            .0
            .get_timestamp()
            .expect("lease tokens are always version 7");
        let (secs, nanos) = ts.to_unix();
        Utc.timestamp_opt(secs as i64, nanos)
            .single()
            .expect("v7 timestamp is always in range")
    }

    /// The raw 16-byte representation stored in the `*_stamp` columns.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Owned BLOB form for binding into statements.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    /// Reconstructs a token from its stored BLOB form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, uuid::Error> {
        Uuid::from_slice(bytes).map(LeaseToken)
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LeaseToken {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<LeaseToken> for Uuid {
    fn from(token: LeaseToken) -> Self {
        token.0
    }
}
