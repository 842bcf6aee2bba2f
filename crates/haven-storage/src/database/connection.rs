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

//! Database connection management for the embedded SQLite store.
//!
//! This module provides an async connection pool built on `deadpool-diesel`.
//! The pool object doubles as the short-lived per-connection mutex: handing a
//! connection to one `interact` closure at a time is what prevents two
//! logical operations from interleaving on one physical handle, without any
//! lock held across business logic.
//!
//! # Example
//!
//! ```rust,ignore
//! use haven_storage::database::Database;
//!
//! let db = Database::new("path/to/identity.db");
//! db.run_migrations().await?;
//! ```

use deadpool_diesel::sqlite::{Manager as SqliteManager, Pool as SqlitePool, Runtime};
use tracing::info;

use crate::error::StorageError;

/// A pool of connections to one tenant collection's SQLite database.
///
/// `Database` is `Clone`; each clone references the same underlying pool and
/// can be shared freely between worker tasks.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(sqlite)")
    }
}

impl Database {
    /// Creates a connection pool for the given SQLite location.
    ///
    /// Accepts a file path, a `sqlite://` URL, a `file:` URI, or `:memory:`.
    ///
    /// # Panics
    ///
    /// Panics if the pool cannot be constructed.
    pub fn new(connection_string: &str) -> Self {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = SqliteManager::new(connection_url, Runtime::Tokio1);

        // SQLite has limited concurrent write support even with WAL mode.
        // A single connection avoids "database is locked" errors and makes
        // the pool the serialization point for statement execution.
        let pool_size = 1;
        let pool = SqlitePool::builder(manager)
            .max_size(pool_size)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: {})", pool_size);

        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Gets a pooled connection.
    pub async fn get_connection(
        &self,
    ) -> Result<deadpool::managed::Object<SqliteManager>, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::ConnectionPool(e.to_string()))
    }

    /// Builds a SQLite connection URL from the accepted input forms.
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending migrations and applies connection pragmas.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        use diesel::prelude::*;
        use diesel_migrations::MigrationHarness;

        let conn = self.get_connection().await?;
        conn.interact(|conn| {
            // WAL mode allows concurrent reads during writes.
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            // busy_timeout makes SQLite wait instead of failing on locks.
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| StorageError::Migration(e.to_string()))?;

            conn.run_pending_migrations(crate::database::MIGRATIONS)
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::ConnectionPool(e.to_string()))??;

        info!("database migrations applied");
        Ok(())
    }
}
