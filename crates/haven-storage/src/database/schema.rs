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

//! Diesel schema for the queue tables.
//!
//! `inbox` and `feed_outbox` expose SQLite's implicit `rowid` as `row_id`:
//! their pop order is insertion order, and `rowid` is the durable record of
//! it. The column is declared for querying only; insert structs never write
//! it.

diesel::table! {
    outbox (identity, drive_id, file_id, recipient) {
        identity -> Text,
        drive_id -> Binary,
        file_id -> Binary,
        recipient -> Text,
        priority -> Integer,
        dependency_file_id -> Nullable<Binary>,
        checkout_count -> Integer,
        next_run_time -> BigInt,
        value -> Nullable<Binary>,
        checkout_stamp -> Nullable<Binary>,
        created -> BigInt,
        modified -> Nullable<BigInt>,
    }
}

diesel::table! {
    inbox (row_id) {
        #[sql_name = "rowid"]
        row_id -> BigInt,
        identity -> Text,
        file_id -> Binary,
        box_id -> Binary,
        priority -> Integer,
        value -> Nullable<Binary>,
        pop_stamp -> Nullable<Binary>,
        created -> BigInt,
        modified -> Nullable<BigInt>,
    }
}

diesel::table! {
    feed_outbox (row_id) {
        #[sql_name = "rowid"]
        row_id -> BigInt,
        identity -> Text,
        file_id -> Binary,
        drive_id -> Binary,
        recipient -> Text,
        value -> Nullable<Binary>,
        pop_stamp -> Nullable<Binary>,
        created -> BigInt,
        modified -> Nullable<BigInt>,
    }
}
