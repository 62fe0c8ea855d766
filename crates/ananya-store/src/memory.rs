//! Process-local store.
//!
//! Holds everything in `parking_lot` maps. Used in tests and when no database
//! path is configured. [`MemoryStore::set_available`] switches every call to
//! [`StoreError::Unavailable`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use ananya_core::delivery::BroadcastRecord;
use ananya_core::ids::{PersonalityId, UserId};
use ananya_core::messages::{Role, Turn};
use ananya_core::personality::{PersonalityProfile, builtin_catalog};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::errors::{Result, StoreError};
use crate::store::{BroadcastArchive, UserCounts, UserProfile, UserRecord, UserStore, normalize_username};

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, UserRecord>,
    turns: HashMap<UserId, Vec<Turn>>,
    catalog: Vec<PersonalityProfile>,
    broadcasts: Vec<BroadcastRecord>,
}

/// In-memory [`UserStore`] and [`BroadcastArchive`].
pub struct MemoryStore {
    inner: RwLock<Inner>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store seeded with the built-in personality catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::with_catalog(builtin_catalog())
    }

    /// Store seeded with a specific catalog.
    #[must_use]
    pub fn with_catalog(catalog: Vec<PersonalityProfile>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                catalog,
                ..Inner::default()
            }),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Register users in one call.
    pub fn seed_users(&self, ids: impl IntoIterator<Item = UserId>) {
        let now = Utc::now();
        let mut inner = self.inner.write();
        for id in ids {
            let _ = inner
                .users
                .entry(id)
                .or_insert_with(|| UserRecord::new(&UserProfile::anonymous(id), now));
        }
    }

    fn check(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".into()))
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn touch_user(&self, profile: &UserProfile) -> Result<UserRecord> {
        self.check()?;
        let now = Utc::now();
        let mut inner = self.inner.write();
        let record = inner
            .users
            .entry(profile.user_id)
            .or_insert_with(|| UserRecord::new(profile, now));
        if profile.username.is_some() {
            record.username.clone_from(&profile.username);
        }
        if profile.first_name.is_some() {
            record.first_name.clone_from(&profile.first_name);
        }
        record.last_active_at = now;
        Ok(record.clone())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        self.check()?;
        Ok(self.inner.read().users.get(&user_id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        self.check()?;
        let wanted = normalize_username(username);
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|u| u.username.as_deref().is_some_and(|name| normalize_username(name) == wanted))
            .cloned())
    }

    async fn reset_user_stats(&self, user_id: UserId) -> Result<bool> {
        self.check()?;
        let mut inner = self.inner.write();
        let Some(record) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        record.message_count = 0;
        Ok(true)
    }

    async fn personality_ref(&self, user_id: UserId) -> Result<Option<PersonalityId>> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .users
            .get(&user_id)
            .and_then(|u| u.personality.clone()))
    }

    async fn set_personality_ref(&self, user_id: UserId, personality: Option<&PersonalityId>) -> Result<()> {
        self.check()?;
        let now = Utc::now();
        let mut inner = self.inner.write();
        let record = inner
            .users
            .entry(user_id)
            .or_insert_with(|| UserRecord::new(&UserProfile::anonymous(user_id), now));
        record.personality = personality.cloned();
        Ok(())
    }

    async fn is_blocked(&self, user_id: UserId) -> Result<bool> {
        self.check()?;
        Ok(self.inner.read().users.get(&user_id).is_some_and(|u| u.is_blocked))
    }

    async fn set_blocked(&self, user_id: UserId, blocked: bool) -> Result<bool> {
        self.check()?;
        let now = Utc::now();
        let mut inner = self.inner.write();
        let record = inner
            .users
            .entry(user_id)
            .or_insert_with(|| UserRecord::new(&UserProfile::anonymous(user_id), now));
        let changed = record.is_blocked != blocked;
        record.is_blocked = blocked;
        Ok(changed)
    }

    async fn list_active_user_ids(&self) -> Result<Vec<UserId>> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .users
            .values()
            .filter(|u| !u.is_blocked)
            .map(|u| u.user_id)
            .collect())
    }

    async fn user_counts(&self) -> Result<UserCounts> {
        self.check()?;
        let inner = self.inner.read();
        let blocked = inner.users.values().filter(|u| u.is_blocked).count() as u64;
        let total = inner.users.len() as u64;
        Ok(UserCounts {
            total,
            active: total - blocked,
            blocked,
        })
    }

    async fn catalog(&self) -> Result<Vec<PersonalityProfile>> {
        self.check()?;
        Ok(self.inner.read().catalog.clone())
    }

    async fn add_personality(&self, profile: &PersonalityProfile) -> Result<()> {
        self.check()?;
        let mut inner = self.inner.write();
        if inner.catalog.iter().any(|p| p.id == profile.id) {
            return Err(StoreError::Duplicate(format!("personality '{}'", profile.id)));
        }
        if profile.is_default {
            for entry in &mut inner.catalog {
                entry.is_default = false;
            }
        }
        inner.catalog.push(profile.clone());
        Ok(())
    }

    async fn remove_personality(&self, id: &PersonalityId) -> Result<bool> {
        self.check()?;
        let mut inner = self.inner.write();
        let Some(pos) = inner.catalog.iter().position(|p| &p.id == id) else {
            return Ok(false);
        };
        if inner.catalog[pos].is_default {
            return Err(StoreError::InvalidOperation(format!(
                "personality '{id}' is the default and cannot be removed"
            )));
        }
        let _ = inner.catalog.remove(pos);
        Ok(true)
    }

    async fn update_personality(
        &self,
        id: &PersonalityId,
        description: &str,
        system_prompt: Option<&str>,
    ) -> Result<Option<PersonalityProfile>> {
        self.check()?;
        let mut inner = self.inner.write();
        let Some(entry) = inner.catalog.iter_mut().find(|p| &p.id == id) else {
            return Ok(None);
        };
        description.clone_into(&mut entry.description);
        if let Some(prompt) = system_prompt {
            prompt.clone_into(&mut entry.system_prompt);
        }
        Ok(Some(entry.clone()))
    }

    async fn append_turn(&self, user_id: UserId, turn: &Turn) -> Result<()> {
        self.check()?;
        let now = Utc::now();
        let mut inner = self.inner.write();
        inner.turns.entry(user_id).or_default().push(turn.clone());
        if turn.role() == Role::User {
            let record = inner
                .users
                .entry(user_id)
                .or_insert_with(|| UserRecord::new(&UserProfile::anonymous(user_id), now));
            record.message_count += 1;
        }
        Ok(())
    }

    async fn recent_turns(&self, user_id: UserId, limit: usize) -> Result<Vec<Turn>> {
        self.check()?;
        let inner = self.inner.read();
        let turns = inner.turns.get(&user_id).map_or(&[][..], Vec::as_slice);
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }

    async fn turn_count(&self, user_id: UserId) -> Result<u64> {
        self.check()?;
        Ok(self.inner.read().turns.get(&user_id).map_or(0, Vec::len) as u64)
    }

    async fn clear_history(&self, user_id: UserId) -> Result<()> {
        self.check()?;
        let _ = self.inner.write().turns.remove(&user_id);
        Ok(())
    }
}

#[async_trait]
impl BroadcastArchive for MemoryStore {
    async fn save_broadcast(&self, record: &BroadcastRecord) -> Result<()> {
        self.check()?;
        let mut inner = self.inner.write();
        if inner.broadcasts.iter().any(|b| b.id == record.id) {
            return Err(StoreError::Duplicate(format!("broadcast '{}'", record.id)));
        }
        inner.broadcasts.push(record.clone());
        Ok(())
    }

    async fn recent_broadcasts(&self, limit: usize) -> Result<Vec<BroadcastRecord>> {
        self.check()?;
        Ok(self
            .inner
            .read()
            .broadcasts
            .iter()
            .rev()
            .take(limit)
            .map(|b| BroadcastRecord {
                outcomes: Vec::new(),
                ..b.clone()
            })
            .collect())
    }

    async fn broadcast_count(&self) -> Result<u64> {
        self.check()?;
        Ok(self.inner.read().broadcasts.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ananya_core::media::NormalizedRequest;
    use assert_matches::assert_matches;

    fn uid(n: i64) -> UserId {
        UserId::new(n)
    }

    #[tokio::test]
    async fn touch_creates_then_refreshes() {
        let store = MemoryStore::new();
        let first = store
            .touch_user(&UserProfile {
                user_id: uid(1),
                username: Some("asha".into()),
                first_name: None,
            })
            .await
            .unwrap();
        assert_eq!(first.username.as_deref(), Some("asha"));

        let second = store.touch_user(&UserProfile::anonymous(uid(1))).await.unwrap();
        assert_eq!(second.username.as_deref(), Some("asha"));
        assert!(second.last_active_at >= first.last_active_at);
    }

    #[tokio::test]
    async fn blocked_users_are_not_active() {
        let store = MemoryStore::new();
        store.seed_users([uid(3), uid(1), uid(2)]);
        assert!(store.set_blocked(uid(2), true).await.unwrap());
        assert!(!store.set_blocked(uid(2), true).await.unwrap());

        assert_eq!(store.list_active_user_ids().await.unwrap(), vec![uid(1), uid(3)]);
        let counts = store.user_counts().await.unwrap();
        assert_eq!(counts, UserCounts { total: 3, active: 2, blocked: 1 });
    }

    #[tokio::test]
    async fn username_lookup_ignores_case_and_at_sign() {
        let store = MemoryStore::new();
        let _ = store
            .touch_user(&UserProfile {
                user_id: uid(9),
                username: Some("Priya_K".into()),
                first_name: Some("Priya".into()),
            })
            .await
            .unwrap();

        let found = store.find_user_by_username("@priya_k").await.unwrap().unwrap();
        assert_eq!(found.user_id, uid(9));
        assert!(store.find_user_by_username("priya").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_stats_zeroes_message_count() {
        let store = MemoryStore::new();
        let turn = Turn::user(&NormalizedRequest::text("hello"));
        store.append_turn(uid(4), &turn).await.unwrap();
        store.append_turn(uid(4), &turn).await.unwrap();
        assert_eq!(store.get_user(uid(4)).await.unwrap().unwrap().message_count, 2);

        assert!(store.reset_user_stats(uid(4)).await.unwrap());
        assert_eq!(store.get_user(uid(4)).await.unwrap().unwrap().message_count, 0);
        assert_eq!(store.turn_count(uid(4)).await.unwrap(), 2);
        assert!(!store.reset_user_stats(uid(5)).await.unwrap());
    }

    #[tokio::test]
    async fn update_personality_keeps_prompt_unless_given() {
        let store = MemoryStore::new();
        let id = PersonalityId::from("spiritual");
        let before = store.catalog().await.unwrap().into_iter().find(|p| p.id == id).unwrap();

        let updated = store
            .update_personality(&id, "Calm guide to scripture and practice.", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.description, "Calm guide to scripture and practice.");
        assert_eq!(updated.system_prompt, before.system_prompt);

        let updated = store
            .update_personality(&id, "Calm guide.", Some("You are a calm guide."))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.system_prompt, "You are a calm guide.");
        assert!(
            store
                .update_personality(&PersonalityId::from("pirate"), "Arr.", None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn blocking_unknown_user_creates_record() {
        let store = MemoryStore::new();
        assert!(store.set_blocked(uid(9), true).await.unwrap());
        assert!(store.is_blocked(uid(9)).await.unwrap());
        assert!(!store.is_blocked(uid(10)).await.unwrap());
    }

    #[tokio::test]
    async fn recent_turns_returns_tail_in_order() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append_turn(uid(1), &Turn::user(&NormalizedRequest::text(format!("m{i}"))))
                .await
                .unwrap();
        }
        let tail = store.recent_turns(uid(1), 2).await.unwrap();
        let contents: Vec<_> = tail.iter().map(Turn::content).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert_eq!(store.get_user(uid(1)).await.unwrap().unwrap().message_count, 5);

        store.clear_history(uid(1)).await.unwrap();
        assert!(store.recent_turns(uid(1), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_default_replaces_old_default() {
        let store = MemoryStore::new();
        let mut poet = PersonalityProfile::fallback();
        poet.id = PersonalityId::from("poet");
        store.add_personality(&poet).await.unwrap();

        let catalog = store.catalog().await.unwrap();
        let defaults: Vec<_> = catalog.iter().filter(|p| p.is_default).map(|p| p.id.as_str()).collect();
        assert_eq!(defaults, vec!["poet"]);
    }

    #[tokio::test]
    async fn duplicate_personality_rejected() {
        let store = MemoryStore::new();
        let err = store.add_personality(&PersonalityProfile::fallback()).await.unwrap_err();
        assert_matches!(err, StoreError::Duplicate(_));
    }

    #[tokio::test]
    async fn default_personality_cannot_be_removed() {
        let store = MemoryStore::new();
        let err = store
            .remove_personality(&PersonalityId::from("default"))
            .await
            .unwrap_err();
        assert_matches!(err, StoreError::InvalidOperation(_));
        assert!(store.remove_personality(&PersonalityId::from("spiritual")).await.unwrap());
        assert!(!store.remove_personality(&PersonalityId::from("spiritual")).await.unwrap());
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert_matches!(store.catalog().await, Err(StoreError::Unavailable(_)));
        assert_matches!(store.list_active_user_ids().await, Err(StoreError::Unavailable(_)));
        store.set_available(true);
        assert!(store.catalog().await.is_ok());
    }
}
