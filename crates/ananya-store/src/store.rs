//! Store traits and record types.

use ananya_core::delivery::BroadcastRecord;
use ananya_core::ids::{PersonalityId, UserId};
use ananya_core::messages::Turn;
use ananya_core::personality::PersonalityProfile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Platform-supplied identity attached to an incoming message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    /// Platform user id.
    pub user_id: UserId,
    /// `@handle`, when the user has one.
    pub username: Option<String>,
    /// First name shown by the platform.
    pub first_name: Option<String>,
}

impl UserProfile {
    /// Profile with only an id.
    #[must_use]
    pub fn anonymous(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
        }
    }
}

/// Persisted user record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Platform user id.
    pub user_id: UserId,
    /// `@handle`.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Selected personality. `None` means the catalog default.
    pub personality: Option<PersonalityId>,
    /// Blocked users receive no replies and no broadcasts.
    pub is_blocked: bool,
    /// Number of user turns recorded.
    pub message_count: u64,
    /// First contact.
    pub created_at: DateTime<Utc>,
    /// Most recent contact.
    pub last_active_at: DateTime<Utc>,
}

/// Normalize an `@handle` for comparison.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

impl UserRecord {
    /// Fresh record for a first contact.
    #[must_use]
    pub fn new(profile: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            user_id: profile.user_id,
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            personality: None,
            is_blocked: false,
            message_count: 0,
            created_at: now,
            last_active_at: now,
        }
    }
}

/// Aggregate user counts for admin stats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    /// All known users.
    pub total: u64,
    /// Users not blocked.
    pub active: u64,
    /// Blocked users.
    pub blocked: u64,
}

/// User, history, and catalog persistence.
///
/// Every method may fail with [`StoreError`](crate::StoreError); callers
/// decide whether a failure is fatal for their operation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create the user on first contact or refresh names and activity time.
    async fn touch_user(&self, profile: &UserProfile) -> Result<UserRecord>;

    /// Fetch one user.
    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    /// Find a user by `@handle`, ignoring case and a leading `@`.
    /// The lowest id wins when several users share a handle.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Zero the user's activity counters. Returns whether the user exists.
    async fn reset_user_stats(&self, user_id: UserId) -> Result<bool>;

    /// The user's selected personality, if any.
    async fn personality_ref(&self, user_id: UserId) -> Result<Option<PersonalityId>>;

    /// Select a personality (or reset to default with `None`).
    async fn set_personality_ref(&self, user_id: UserId, personality: Option<&PersonalityId>) -> Result<()>;

    /// Whether the user is blocked. Unknown users are not.
    async fn is_blocked(&self, user_id: UserId) -> Result<bool>;

    /// Set the blocked flag, creating the user when unknown. Returns whether the flag changed.
    async fn set_blocked(&self, user_id: UserId, blocked: bool) -> Result<bool>;

    /// Ids of all users not blocked, ascending.
    async fn list_active_user_ids(&self) -> Result<Vec<UserId>>;

    /// User totals.
    async fn user_counts(&self) -> Result<UserCounts>;

    /// All catalog entries.
    async fn catalog(&self) -> Result<Vec<PersonalityProfile>>;

    /// Add a catalog entry. A new default replaces the previous one.
    async fn add_personality(&self, profile: &PersonalityProfile) -> Result<()>;

    /// Remove a catalog entry. Returns whether it existed. The default cannot be removed.
    async fn remove_personality(&self, id: &PersonalityId) -> Result<bool>;

    /// Replace an entry's description and, when given, its system prompt.
    /// Returns the updated entry, or `None` if it does not exist.
    async fn update_personality(
        &self,
        id: &PersonalityId,
        description: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<PersonalityProfile>>;

    /// Persist one turn of the user's history.
    async fn append_turn(&self, user_id: UserId, turn: &Turn) -> Result<()>;

    /// The most recent `limit` turns, oldest first.
    async fn recent_turns(&self, user_id: UserId, limit: usize) -> Result<Vec<Turn>>;

    /// Number of persisted turns for the user.
    async fn turn_count(&self, user_id: UserId) -> Result<u64>;

    /// Drop all persisted turns for the user.
    async fn clear_history(&self, user_id: UserId) -> Result<()>;
}

/// Completed broadcast archive.
#[async_trait]
pub trait BroadcastArchive: Send + Sync {
    /// Persist a finished broadcast with its per-user outcomes.
    async fn save_broadcast(&self, record: &BroadcastRecord) -> Result<()>;

    /// Most recent broadcasts first, without per-user outcomes.
    async fn recent_broadcasts(&self, limit: usize) -> Result<Vec<BroadcastRecord>>;

    /// Total archived broadcasts.
    async fn broadcast_count(&self) -> Result<u64>;
}
