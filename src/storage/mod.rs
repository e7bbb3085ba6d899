//! Optional SQLite analytics store.
//!
//! Usage counters per user/group plus feedback rows for the 👍/👎 quick
//! replies. Nothing here affects reply correctness; every call site logs
//! and swallows errors so a broken database can never block a reply.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::errors::BotError;

pub struct Analytics {
    pool: SqlitePool,
}

impl Analytics {
    /// Connect to (creating if needed) the SQLite database at
    /// `database_url` and ensure the tables exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the database is
    /// unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, BotError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| BotError::StorageError(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let analytics = Self { pool };
        analytics.create_tables().await?;
        info!("SQLite analytics store ready");
        Ok(analytics)
    }

    async fn create_tables(&self) -> Result<(), BotError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                help_count INTEGER NOT NULL DEFAULT 0,
                block BOOLEAN,
                last_block TIMESTAMP,
                msg_count INTEGER NOT NULL DEFAULT 0,
                last_use TIMESTAMP,
                first_use TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                leave BOOLEAN,
                msg_count INTEGER NOT NULL DEFAULT 0,
                last_use TIMESTAMP,
                first_use TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                input TEXT NOT NULL,
                output TEXT NOT NULL,
                user_id TEXT NOT NULL,
                create_time TIMESTAMP NOT NULL,
                preference INTEGER,
                FOREIGN KEY(user_id) REFERENCES users(id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update one user row. Counters are incremented, `block`
    /// only overwrites when provided.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn upsert_user(
        &self,
        user_id: &str,
        help_count_inc: i64,
        block: Option<bool>,
        msg_count_inc: i64,
    ) -> Result<(), BotError> {
        let now = Utc::now();
        let last_block: Option<DateTime<Utc>> = if block == Some(true) { Some(now) } else { None };

        sqlx::query(
            r"
            INSERT INTO users (id, help_count, block, last_block, msg_count, last_use, first_use)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                help_count = help_count + excluded.help_count,
                msg_count = msg_count + excluded.msg_count,
                last_use = excluded.last_use,
                block = COALESCE(excluded.block, block),
                last_block = COALESCE(excluded.last_block, last_block)
            ",
        )
        .bind(user_id)
        .bind(help_count_inc)
        .bind(block)
        .bind(last_block)
        .bind(msg_count_inc)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %user_id, "upserted user");
        Ok(())
    }

    /// Insert or update one group row.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn upsert_group(
        &self,
        group_id: &str,
        leave: Option<bool>,
        msg_count_inc: i64,
    ) -> Result<(), BotError> {
        let now = Utc::now();

        sqlx::query(
            r"
            INSERT INTO groups (id, leave, msg_count, last_use, first_use)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                leave = COALESCE(excluded.leave, leave),
                msg_count = msg_count + excluded.msg_count,
                last_use = excluded.last_use
            ",
        )
        .bind(group_id)
        .bind(leave)
        .bind(msg_count_inc)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(group_id = %group_id, "upserted group");
        Ok(())
    }

    /// Insert a feedback row and return its id for the quick-reply buttons.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn insert_feedback(
        &self,
        input: &str,
        output: &str,
        user_id: &str,
    ) -> Result<i64, BotError> {
        let result = sqlx::query(
            "INSERT INTO feedback (input, output, user_id, create_time) VALUES (?, ?, ?, ?)",
        )
        .bind(input)
        .bind(output)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Record the user's 👍/👎 rating on a feedback row.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub async fn update_feedback_preference(
        &self,
        feedback_id: i64,
        preference: i64,
    ) -> Result<(), BotError> {
        sqlx::query("UPDATE feedback SET preference = ? WHERE id = ?")
            .bind(preference)
            .bind(feedback_id)
            .execute(&self.pool)
            .await?;

        debug!(feedback_id, preference, "updated feedback preference");
        Ok(())
    }

    /// Read back one feedback row's preference (used by tests and ad-hoc
    /// inspection).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn feedback_preference(&self, feedback_id: i64) -> Result<Option<i64>, BotError> {
        let row = sqlx::query("SELECT preference FROM feedback WHERE id = ?")
            .bind(feedback_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("preference")?)
    }
}
