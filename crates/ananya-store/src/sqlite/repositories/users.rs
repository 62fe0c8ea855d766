//! `users` table.

use ananya_core::ids::{PersonalityId, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::parse_time;
use crate::errors::Result;
use crate::store::{UserCounts, UserProfile, UserRecord, normalize_username};

const COLUMNS: &str =
    "user_id, username, first_name, personality, is_blocked, message_count, created_at, last_active_at";

/// User repository.
pub struct UserRepo;

impl UserRepo {
    /// Insert on first contact, otherwise refresh known names and activity time.
    pub fn touch(conn: &Connection, profile: &UserProfile, now: DateTime<Utc>) -> Result<UserRecord> {
        let now = now.to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO users (user_id, username, first_name, created_at, last_active_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                 username = COALESCE(excluded.username, users.username),
                 first_name = COALESCE(excluded.first_name, users.first_name),
                 last_active_at = excluded.last_active_at",
            params![profile.user_id.get(), profile.username, profile.first_name, now],
        )?;
        let record = conn.query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE user_id = ?1"),
            params![profile.user_id.get()],
            Self::map_row,
        )?;
        Ok(record)
    }

    /// Insert a bare row if the user is unknown.
    pub fn ensure(conn: &Connection, user_id: UserId, now: DateTime<Utc>) -> Result<()> {
        let now = now.to_rfc3339();
        let _ = conn.execute(
            "INSERT OR IGNORE INTO users (user_id, created_at, last_active_at) VALUES (?1, ?2, ?2)",
            params![user_id.get(), now],
        )?;
        Ok(())
    }

    /// Fetch one user.
    pub fn get(conn: &Connection, user_id: UserId) -> Result<Option<UserRecord>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id.get()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Lowest-id user whose handle matches, ignoring case and `@`.
    pub fn find_by_username(conn: &Connection, username: &str) -> Result<Option<UserRecord>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM users WHERE LOWER(username) = ?1 ORDER BY user_id LIMIT 1"),
                params![normalize_username(username)],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Zero the activity counters. Returns whether the user exists.
    pub fn reset_stats(conn: &Connection, user_id: UserId) -> Result<bool> {
        let n = conn.execute(
            "UPDATE users SET message_count = 0 WHERE user_id = ?1",
            params![user_id.get()],
        )?;
        Ok(n > 0)
    }

    /// Selected personality key.
    pub fn personality(conn: &Connection, user_id: UserId) -> Result<Option<PersonalityId>> {
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT personality FROM users WHERE user_id = ?1",
                params![user_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten().map(PersonalityId::from_string))
    }

    /// Store the selected personality key.
    pub fn set_personality(
        conn: &Connection,
        user_id: UserId,
        personality: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        Self::ensure(conn, user_id, now)?;
        let _ = conn.execute(
            "UPDATE users SET personality = ?2 WHERE user_id = ?1",
            params![user_id.get(), personality],
        )?;
        Ok(())
    }

    /// Whether the user is blocked.
    pub fn is_blocked(conn: &Connection, user_id: UserId) -> Result<bool> {
        let blocked: Option<bool> = conn
            .query_row(
                "SELECT is_blocked FROM users WHERE user_id = ?1",
                params![user_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blocked.unwrap_or(false))
    }

    /// Set the blocked flag. Returns whether it changed.
    pub fn set_blocked(conn: &Connection, user_id: UserId, blocked: bool, now: DateTime<Utc>) -> Result<bool> {
        Self::ensure(conn, user_id, now)?;
        let changed = conn.execute(
            "UPDATE users SET is_blocked = ?2 WHERE user_id = ?1 AND is_blocked != ?2",
            params![user_id.get(), blocked],
        )?;
        Ok(changed > 0)
    }

    /// Bump the user-turn counter.
    pub fn increment_messages(conn: &Connection, user_id: UserId, now: DateTime<Utc>) -> Result<()> {
        Self::ensure(conn, user_id, now)?;
        let _ = conn.execute(
            "UPDATE users SET message_count = message_count + 1 WHERE user_id = ?1",
            params![user_id.get()],
        )?;
        Ok(())
    }

    /// Ids of users not blocked, ascending.
    pub fn active_ids(conn: &Connection) -> Result<Vec<UserId>> {
        let mut stmt = conn.prepare("SELECT user_id FROM users WHERE is_blocked = 0 ORDER BY user_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0).map(UserId::new))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// User totals.
    pub fn counts(conn: &Connection) -> Result<UserCounts> {
        let (total, blocked): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_blocked), 0) FROM users",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(UserCounts {
            total: total as u64,
            active: (total - blocked) as u64,
            blocked: blocked as u64,
        })
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
        let created: String = row.get(6)?;
        let last_active: String = row.get(7)?;
        Ok(UserRecord {
            user_id: UserId::new(row.get(0)?),
            username: row.get(1)?,
            first_name: row.get(2)?,
            personality: row.get::<_, Option<String>>(3)?.map(PersonalityId::from_string),
            is_blocked: row.get(4)?,
            message_count: row.get::<_, i64>(5)? as u64,
            created_at: parse_time(6, &created)?,
            last_active_at: parse_time(7, &last_active)?,
        })
    }
}
