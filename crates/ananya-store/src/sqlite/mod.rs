//! `SQLite` backend.
//!
//! - [`connection`]: `r2d2` pool with WAL and foreign keys on every connection.
//! - [`migrations`]: embedded, version-tracked schema.
//! - [`repositories`]: stateless SQL per table.
//!
//! [`SqliteStore`] wraps the pool and moves every call onto the blocking
//! thread pool.

pub mod connection;
pub mod migrations;
pub mod repositories;

use std::path::Path;

use ananya_core::delivery::{BroadcastRecord, DeliveryOutcome};
use ananya_core::ids::{BroadcastId, PersonalityId, UserId};
use ananya_core::messages::{Role, Turn};
use ananya_core::personality::{PersonalityProfile, builtin_catalog};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, instrument};

pub use connection::{ConnectionConfig, ConnectionPool, new_file, new_in_memory};
use repositories::{BroadcastRepo, PersonalityRepo, TurnRepo, UserRepo};

use crate::errors::{Result, StoreError};
use crate::store::{BroadcastArchive, UserCounts, UserProfile, UserRecord, UserStore};

/// `SQLite`-backed [`UserStore`] and [`BroadcastArchive`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Open (or create) a database file, migrate it, and seed the catalog.
    pub fn open(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Internal(format!("create {}: {e}", parent.display())))?;
            }
        }
        let path_str = path.to_string_lossy();
        let pool = new_file(&path_str, config)?;
        let store = Self::from_pool(pool)?;
        info!(path = %path_str, "opened sqlite store");
        Ok(store)
    }

    /// Single-connection in-memory database.
    pub fn in_memory() -> Result<Self> {
        let config = ConnectionConfig {
            pool_size: 1,
            ..ConnectionConfig::default()
        };
        Self::from_pool(new_in_memory(&config)?)
    }

    /// Wrap an existing pool, migrating and seeding it.
    pub fn from_pool(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let _ = migrations::run_migrations(&conn)?;
            let seeded = PersonalityRepo::seed_if_empty(&conn, &builtin_catalog(), Utc::now())?;
            if seeded > 0 {
                info!(seeded, "seeded personality catalog");
            }
        }
        Ok(Self { pool })
    }

    /// Per-user outcomes of an archived broadcast.
    pub async fn broadcast_outcomes(&self, id: &BroadcastId) -> Result<Vec<(UserId, DeliveryOutcome)>> {
        let id = id.clone();
        self.with_conn(move |conn| BroadcastRepo::outcomes(conn, &id)).await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn touch_user(&self, profile: &UserProfile) -> Result<UserRecord> {
        let profile = profile.clone();
        self.with_conn(move |conn| UserRepo::touch(conn, &profile, Utc::now())).await
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        self.with_conn(move |conn| UserRepo::get(conn, user_id)).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let username = username.to_owned();
        self.with_conn(move |conn| UserRepo::find_by_username(conn, &username)).await
    }

    #[instrument(skip(self))]
    async fn reset_user_stats(&self, user_id: UserId) -> Result<bool> {
        self.with_conn(move |conn| UserRepo::reset_stats(conn, user_id)).await
    }

    async fn personality_ref(&self, user_id: UserId) -> Result<Option<PersonalityId>> {
        self.with_conn(move |conn| UserRepo::personality(conn, user_id)).await
    }

    async fn set_personality_ref(&self, user_id: UserId, personality: Option<&PersonalityId>) -> Result<()> {
        let personality = personality.map(|p| p.as_str().to_owned());
        self.with_conn(move |conn| UserRepo::set_personality(conn, user_id, personality.as_deref(), Utc::now()))
            .await
    }

    async fn is_blocked(&self, user_id: UserId) -> Result<bool> {
        self.with_conn(move |conn| UserRepo::is_blocked(conn, user_id)).await
    }

    #[instrument(skip(self))]
    async fn set_blocked(&self, user_id: UserId, blocked: bool) -> Result<bool> {
        self.with_conn(move |conn| UserRepo::set_blocked(conn, user_id, blocked, Utc::now()))
            .await
    }

    async fn list_active_user_ids(&self) -> Result<Vec<UserId>> {
        self.with_conn(UserRepo::active_ids).await
    }

    async fn user_counts(&self) -> Result<UserCounts> {
        self.with_conn(UserRepo::counts).await
    }

    async fn catalog(&self) -> Result<Vec<PersonalityProfile>> {
        self.with_conn(PersonalityRepo::list).await
    }

    #[instrument(skip(self, profile), fields(personality = %profile.id))]
    async fn add_personality(&self, profile: &PersonalityProfile) -> Result<()> {
        let profile = profile.clone();
        self.with_conn(move |conn| PersonalityRepo::insert(conn, &profile, Utc::now()))
            .await
    }

    #[instrument(skip(self))]
    async fn remove_personality(&self, id: &PersonalityId) -> Result<bool> {
        let id = id.clone();
        self.with_conn(move |conn| PersonalityRepo::delete(conn, &id)).await
    }

    #[instrument(skip(self, description, system_prompt))]
    async fn update_personality(
        &self,
        id: &PersonalityId,
        description: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<PersonalityProfile>> {
        let id = id.clone();
        let description = description.to_owned();
        let system_prompt = system_prompt.map(str::to_owned);
        self.with_conn(move |conn| PersonalityRepo::update(conn, &id, &description, system_prompt.as_deref()))
            .await
    }

    async fn append_turn(&self, user_id: UserId, turn: &Turn) -> Result<()> {
        let turn = turn.clone();
        self.with_conn(move |conn| {
            TurnRepo::append(conn, user_id, &turn)?;
            if turn.role() == Role::User {
                UserRepo::increment_messages(conn, user_id, Utc::now())?;
            }
            Ok(())
        })
        .await
    }

    async fn recent_turns(&self, user_id: UserId, limit: usize) -> Result<Vec<Turn>> {
        self.with_conn(move |conn| TurnRepo::recent(conn, user_id, limit)).await
    }

    async fn turn_count(&self, user_id: UserId) -> Result<u64> {
        self.with_conn(move |conn| TurnRepo::count(conn, user_id)).await
    }

    async fn clear_history(&self, user_id: UserId) -> Result<()> {
        self.with_conn(move |conn| TurnRepo::clear(conn, user_id).map(|_| ()))
            .await
    }
}

#[async_trait]
impl BroadcastArchive for SqliteStore {
    #[instrument(skip(self, record), fields(broadcast_id = %record.id))]
    async fn save_broadcast(&self, record: &BroadcastRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| BroadcastRepo::insert(conn, &record)).await
    }

    async fn recent_broadcasts(&self, limit: usize) -> Result<Vec<BroadcastRecord>> {
        self.with_conn(move |conn| BroadcastRepo::recent(conn, limit)).await
    }

    async fn broadcast_count(&self) -> Result<u64> {
        self.with_conn(BroadcastRepo::count).await
    }
}
