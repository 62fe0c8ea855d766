//! Operator actions: user lookup and moderation, catalog edits, direct
//! messages, broadcasts, statistics.

use std::sync::{Arc, LazyLock};

use ananya_core::delivery::{BroadcastRecord, BroadcastStatus, DeliverySummary};
use ananya_core::errors::{AnanyaError, Result};
use ananya_core::ids::{BroadcastId, PersonalityId, UserId};
use ananya_core::personality::{PersonalityProfile, display_name_for};
use ananya_core::text::char_len;
use ananya_store::{BroadcastArchive, UserRecord, UserStore, normalize_username};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::broadcast::{BroadcastDispatcher, BroadcastJob, JobSnapshot};
use crate::engine::ChatEngine;
use crate::personality::PersonalityResolver;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\s\-_]+$").unwrap());

const NAME_CHARS: (usize, usize) = (2, 50);
const DESCRIPTION_CHARS: (usize, usize) = (10, 500);
const PROMPT_MAX_CHARS: usize = 2000;
const LOOKUP_MAX_CHARS: usize = 100;
const USERNAME_MAX_CHARS: usize = 32;
/// Numeric lookups must fall below this bound.
const USER_ID_CEILING: i64 = 10_000_000_000;

/// Catalog entry requested by an operator.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPersonality {
    /// Name; becomes the catalog key after trimming and lowercasing.
    pub name: String,
    /// Short description shown to users.
    pub description: String,
    /// System prompt. Generated from the name and description when absent.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Replacement text for an existing catalog entry.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityUpdate {
    /// New description.
    pub description: String,
    /// New system prompt. The current one is kept when absent.
    #[serde(default)]
    pub prompt: Option<String>,
}

/// One user as seen by an operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    /// Stored record.
    #[serde(flatten)]
    pub user: UserRecord,
    /// Personality the user's next turn runs under.
    pub active_personality: PersonalityId,
    /// Persisted history turns.
    pub turn_count: u64,
    /// Whole days since the last contact.
    pub days_since_active: i64,
}

/// Status of a broadcast, running or finished.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastView {
    /// Job id.
    pub id: BroadcastId,
    /// Lifecycle state.
    pub status: BroadcastStatus,
    /// Counts so far.
    pub summary: DeliverySummary,
    /// Whether cancellation was requested.
    pub cancelled: bool,
    /// Admission time.
    pub created_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobSnapshot> for BroadcastView {
    fn from(s: JobSnapshot) -> Self {
        Self {
            id: s.id,
            status: s.status,
            summary: s.summary,
            cancelled: s.cancelled,
            created_at: s.created_at,
            completed_at: s.completed_at,
        }
    }
}

impl From<BroadcastRecord> for BroadcastView {
    fn from(r: BroadcastRecord) -> Self {
        Self {
            id: r.id,
            status: BroadcastStatus::Completed,
            summary: r.summary,
            cancelled: r.cancelled,
            created_at: r.created_at,
            completed_at: Some(r.completed_at),
        }
    }
}

/// Population and broadcast counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    /// Users ever seen.
    pub total_users: u64,
    /// Users not blocked.
    pub active_users: u64,
    /// Blocked users.
    pub blocked_users: u64,
    /// Broadcasts finished.
    pub broadcasts: u64,
    /// Deliveries across recent broadcasts.
    pub recent_delivered: usize,
    /// Broadcasts running now.
    pub active_jobs: usize,
}

/// Operator-facing service.
pub struct AdminService {
    store: Arc<dyn UserStore>,
    archive: Option<Arc<dyn BroadcastArchive>>,
    dispatcher: Arc<BroadcastDispatcher>,
    engine: Option<Arc<ChatEngine>>,
}

impl AdminService {
    /// Service over `store` broadcasting through `dispatcher`.
    pub fn new(store: Arc<dyn UserStore>, dispatcher: Arc<BroadcastDispatcher>) -> Self {
        Self {
            store,
            archive: None,
            dispatcher,
            engine: None,
        }
    }

    /// Send direct messages through `engine`.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<ChatEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Count broadcasts from `archive` instead of the in-memory ledger.
    #[must_use]
    pub fn with_archive(mut self, archive: Arc<dyn BroadcastArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Broadcast dispatcher.
    pub fn dispatcher(&self) -> &Arc<BroadcastDispatcher> {
        &self.dispatcher
    }

    /// Block a user. Returns whether the flag changed.
    #[instrument(skip(self))]
    pub async fn block_user(&self, user_id: UserId) -> Result<bool> {
        let changed = self.store.set_blocked(user_id, true).await?;
        info!(user_id = %user_id, changed, "user blocked");
        Ok(changed)
    }

    /// Unblock a user. Returns whether the flag changed.
    #[instrument(skip(self))]
    pub async fn unblock_user(&self, user_id: UserId) -> Result<bool> {
        let changed = self.store.set_blocked(user_id, false).await?;
        info!(user_id = %user_id, changed, "user unblocked");
        Ok(changed)
    }

    /// Find a user by numeric id or `@handle`.
    ///
    /// Input is trimmed and must be 1-100 characters. All-digit input is an id
    /// in `1..10^10`; anything else is a handle of at most 32 characters.
    pub async fn lookup_user(&self, input: &str) -> Result<Option<UserRecord>> {
        let input = input.trim();
        let len = char_len(input);
        if len == 0 || len > LOOKUP_MAX_CHARS {
            return Err(AnanyaError::validation(format!(
                "user lookup must be 1-{LOOKUP_MAX_CHARS} characters"
            )));
        }
        if input.bytes().all(|b| b.is_ascii_digit()) {
            let id = input
                .parse::<i64>()
                .ok()
                .filter(|n| (1..USER_ID_CEILING).contains(n))
                .ok_or_else(|| AnanyaError::validation(format!("user id {input} is out of range")))?;
            return Ok(self.store.get_user(UserId::new(id)).await?);
        }
        let handle = normalize_username(input);
        if handle.is_empty() || char_len(&handle) > USERNAME_MAX_CHARS {
            return Err(AnanyaError::validation(format!(
                "username must be 1-{USERNAME_MAX_CHARS} characters"
            )));
        }
        Ok(self.store.find_user_by_username(&handle).await?)
    }

    /// Record, active personality, and activity for one user.
    pub async fn user_details(&self, user_id: UserId) -> Result<Option<UserDetails>> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        let turn_count = self.store.turn_count(user_id).await?;
        let active = PersonalityResolver::new(Arc::clone(&self.store))
            .resolve_or_fallback(user_id)
            .await;
        let days_since_active = (Utc::now() - user.last_active_at).num_days().max(0);
        Ok(Some(UserDetails {
            user,
            active_personality: active.id,
            turn_count,
            days_since_active,
        }))
    }

    /// Zero a user's message counter. Returns whether the user exists.
    #[instrument(skip(self))]
    pub async fn reset_user_stats(&self, user_id: UserId) -> Result<bool> {
        let found = self.store.reset_user_stats(user_id).await?;
        if found {
            info!(user_id = %user_id, "user stats reset");
        }
        Ok(found)
    }

    /// Send `text` to one user, chunked like a reply.
    ///
    /// Returns the number of messages sent, or `None` for an unknown user.
    /// Blocked users are refused.
    #[instrument(skip(self, text))]
    pub async fn send_message(&self, user_id: UserId, text: &str) -> Result<Option<usize>> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| AnanyaError::misconfiguration("direct messages need a chat engine"))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AnanyaError::validation("message is empty"));
        }
        let len = char_len(text);
        let max = self.dispatcher.config().max_message_chars;
        if len > max {
            return Err(AnanyaError::validation(format!(
                "message is too long ({len} characters, limit {max})"
            )));
        }
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        if user.is_blocked {
            return Err(AnanyaError::validation(format!("user {user_id} is blocked")));
        }
        let sent = engine.send_text(user_id, text).await?;
        info!(user_id = %user_id, chunks = sent, "direct message sent");
        Ok(Some(sent))
    }

    /// Catalog entries in display order.
    pub async fn personalities(&self) -> Result<Vec<PersonalityProfile>> {
        Ok(self.store.catalog().await?)
    }

    /// Validate and add a catalog entry.
    #[instrument(skip_all, fields(name = %new.name))]
    pub async fn add_personality(&self, new: NewPersonality) -> Result<PersonalityProfile> {
        let profile = build_profile(new)?;
        self.store.add_personality(&profile).await?;
        info!(personality = %profile.id, "personality added");
        Ok(profile)
    }

    /// Replace an entry's description and optionally its prompt.
    /// Returns `None` when no entry has that name.
    #[instrument(skip(self, update))]
    pub async fn update_personality(
        &self,
        name: &str,
        update: PersonalityUpdate,
    ) -> Result<Option<PersonalityProfile>> {
        let id = PersonalityId::normalized(name);
        let description = checked_description(&update.description)?;
        let prompt = checked_prompt(update.prompt)?;
        let updated = self
            .store
            .update_personality(&id, &description, prompt.as_deref())
            .await?;
        if updated.is_some() {
            info!(personality = %id, prompt_changed = prompt.is_some(), "personality updated");
        }
        Ok(updated)
    }

    /// Remove a catalog entry. The default entry cannot be removed.
    #[instrument(skip(self))]
    pub async fn remove_personality(&self, id: &PersonalityId) -> Result<bool> {
        let removed = self.store.remove_personality(id).await?;
        if removed {
            info!(personality = %id, "personality removed");
        }
        Ok(removed)
    }

    /// Broadcast `message` to every active user.
    #[instrument(skip_all)]
    pub async fn start_broadcast(&self, message: &str) -> Result<Arc<BroadcastJob>> {
        let targets = self.store.list_active_user_ids().await?;
        self.dispatcher.dispatch(message, targets)
    }

    /// Live status of a running job, or the ledger entry of a finished one.
    pub fn broadcast_status(&self, id: &BroadcastId) -> Option<BroadcastView> {
        if let Some(job) = self.dispatcher.job(id) {
            return Some(job.snapshot().into());
        }
        self.dispatcher.ledger().get(id).map(Into::into)
    }

    /// Request cancellation. Returns `false` if the job is not running.
    pub fn cancel_broadcast(&self, id: &BroadcastId) -> bool {
        self.dispatcher.cancel(id)
    }

    /// Finished broadcasts, newest first.
    pub fn recent_broadcasts(&self, limit: usize) -> Vec<BroadcastView> {
        self.dispatcher
            .ledger()
            .recent(limit)
            .into_iter()
            .map(Into::into)
            .collect()
    }

    /// Population and broadcast counters.
    pub async fn stats(&self) -> Result<AdminStats> {
        let counts = self.store.user_counts().await?;
        let ledger = self.dispatcher.ledger();
        let broadcasts = match &self.archive {
            Some(archive) => match archive.broadcast_count().await {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "broadcast count unavailable, using ledger");
                    ledger.len() as u64
                }
            },
            None => ledger.len() as u64,
        };
        Ok(AdminStats {
            total_users: counts.total,
            active_users: counts.active,
            blocked_users: counts.blocked,
            broadcasts,
            recent_delivered: ledger.delivered_total(),
            active_jobs: self.dispatcher.active_jobs(),
        })
    }
}

fn build_profile(new: NewPersonality) -> Result<PersonalityProfile> {
    let id = PersonalityId::normalized(&new.name);
    let name_len = char_len(id.as_str());
    if name_len < NAME_CHARS.0 || name_len > NAME_CHARS.1 {
        return Err(AnanyaError::validation(format!(
            "personality name must be {}-{} characters",
            NAME_CHARS.0, NAME_CHARS.1
        )));
    }
    if !NAME_PATTERN.is_match(id.as_str()) {
        return Err(AnanyaError::validation(
            "personality name may only contain letters, digits, spaces, hyphens, and underscores",
        ));
    }

    let description = checked_description(&new.description)?;
    let system_prompt = checked_prompt(new.prompt)?.unwrap_or_else(|| {
        format!("You are Ananya, in {id} mode. {description}. Be helpful, friendly, and engaging.")
    });

    Ok(PersonalityProfile {
        display_name: display_name_for(id.as_str()),
        id,
        description,
        system_prompt,
        is_default: false,
    })
}

fn checked_description(raw: &str) -> Result<String> {
    let description = raw.trim();
    let len = char_len(description);
    if len < DESCRIPTION_CHARS.0 || len > DESCRIPTION_CHARS.1 {
        return Err(AnanyaError::validation(format!(
            "description must be {}-{} characters",
            DESCRIPTION_CHARS.0, DESCRIPTION_CHARS.1
        )));
    }
    Ok(description.to_owned())
}

/// Trimmed prompt; blank counts as absent.
fn checked_prompt(raw: Option<String>) -> Result<Option<String>> {
    match raw.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty()) {
        Some(p) if char_len(&p) > PROMPT_MAX_CHARS => Err(AnanyaError::validation(format!(
            "prompt must be at most {PROMPT_MAX_CHARS} characters"
        ))),
        other => Ok(other),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastConfig;
    use crate::engine::EngineConfig;
    use crate::ledger::DeliveryLedger;
    use crate::test_utils::{ScriptedModel, ScriptedTransport, SendStep};
    use ananya_core::media::NormalizedRequest;
    use ananya_core::messages::Turn;
    use ananya_store::{MemoryStore, UserProfile};
    use assert_matches::assert_matches;

    fn bare_service() -> (Arc<MemoryStore>, Arc<ScriptedTransport>, AdminService) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(ScriptedTransport::new());
        let ledger = Arc::new(DeliveryLedger::with_archive(store.clone()));
        let config = BroadcastConfig {
            sends_per_second: 1000,
            ..BroadcastConfig::default()
        };
        let dispatcher = Arc::new(BroadcastDispatcher::new(transport.clone(), config, ledger));
        let admin = AdminService::new(store.clone(), dispatcher).with_archive(store.clone());
        (store, transport, admin)
    }

    fn service() -> (Arc<MemoryStore>, Arc<ScriptedTransport>, AdminService) {
        let (store, transport, admin) = bare_service();
        let engine = Arc::new(ChatEngine::new(
            store.clone(),
            Arc::new(ScriptedModel::new()),
            transport.clone(),
            EngineConfig::default(),
        ));
        (store, transport, admin.with_engine(engine))
    }

    async fn known_user(store: &MemoryStore, id: i64, username: &str) -> UserId {
        let user_id = UserId::new(id);
        let _ = store
            .touch_user(&UserProfile {
                user_id,
                username: Some(username.into()),
                first_name: Some("Kiran".into()),
            })
            .await
            .unwrap();
        user_id
    }

    fn new_personality(name: &str, description: &str, prompt: Option<&str>) -> NewPersonality {
        NewPersonality {
            name: name.into(),
            description: description.into(),
            prompt: prompt.map(Into::into),
        }
    }

    #[tokio::test]
    async fn block_and_unblock_report_changes() {
        let (store, _, admin) = service();
        store.seed_users([UserId::new(1)]);
        assert!(admin.block_user(UserId::new(1)).await.unwrap());
        assert!(!admin.block_user(UserId::new(1)).await.unwrap());
        assert!(store.is_blocked(UserId::new(1)).await.unwrap());
        assert!(admin.unblock_user(UserId::new(1)).await.unwrap());
        assert!(!admin.unblock_user(UserId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn add_personality_generates_prompt() {
        let (_, _, admin) = service();
        let profile = admin
            .add_personality(new_personality("  Poet Mode ", "Answers in gentle verse", None))
            .await
            .unwrap();
        assert_eq!(profile.id.as_str(), "poet mode");
        assert_eq!(profile.display_name, "Poet Mode");
        assert_eq!(
            profile.system_prompt,
            "You are Ananya, in poet mode mode. Answers in gentle verse. Be helpful, friendly, and engaging."
        );
        assert!(!profile.is_default);
        assert_eq!(admin.personalities().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn add_personality_validates_fields() {
        let (_, _, admin) = service();
        let cases = [
            new_personality("x", "long enough description", None),
            new_personality(&"n".repeat(51), "long enough description", None),
            new_personality("bad!name", "long enough description", None),
            new_personality("coach", "too short", None),
            new_personality("coach", "long enough description", Some(&"p".repeat(2001))),
            new_personality("spiritual", "long enough description", None),
        ];
        for case in cases {
            assert_matches!(admin.add_personality(case).await, Err(AnanyaError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn default_personality_cannot_be_removed() {
        let (_, _, admin) = service();
        assert_matches!(
            admin.remove_personality(&PersonalityId::from("default")).await,
            Err(AnanyaError::Validation { .. })
        );
        assert!(admin.remove_personality(&PersonalityId::from("spiritual")).await.unwrap());
        assert!(!admin.remove_personality(&PersonalityId::from("spiritual")).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_reaches_active_users_only() {
        let (store, transport, admin) = service();
        store.seed_users((1..=5).map(UserId::new));
        let _ = admin.block_user(UserId::new(3)).await.unwrap();
        transport.script(UserId::new(4), [SendStep::Blocked]);

        let job = admin.start_broadcast("Happy Holi!").await.unwrap();
        assert_eq!(job.total(), 4);
        job.wait().await;

        let view = admin.broadcast_status(job.id()).unwrap();
        assert_eq!(view.status, BroadcastStatus::Completed);
        assert_eq!((view.summary.delivered, view.summary.blocked), (3, 1));
        assert!(transport.sent_to(UserId::new(3)).is_empty());

        let stats = admin.stats().await.unwrap();
        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.blocked_users, 1);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.recent_delivered, 3);
        assert_eq!(stats.active_jobs, 0);
        assert_eq!(admin.recent_broadcasts(10).len(), 1);
    }

    #[tokio::test]
    async fn broadcast_without_users_is_rejected() {
        let (_, _, admin) = service();
        assert_matches!(
            admin.start_broadcast("hello").await,
            Err(AnanyaError::Validation { ref message }) if message.contains("no active users")
        );
    }

    #[tokio::test]
    async fn unknown_broadcast_has_no_status() {
        let (_, _, admin) = service();
        let id = BroadcastId::new();
        assert!(admin.broadcast_status(&id).is_none());
        assert!(!admin.cancel_broadcast(&id));
    }

    #[tokio::test]
    async fn lookup_accepts_ids_and_handles() {
        let (store, _, admin) = service();
        let id = known_user(&store, 4242, "Kiran_S").await;

        assert_eq!(admin.lookup_user(" 4242 ").await.unwrap().unwrap().user_id, id);
        assert_eq!(admin.lookup_user("@kiran_s").await.unwrap().unwrap().user_id, id);
        assert_eq!(admin.lookup_user("KIRAN_S").await.unwrap().unwrap().user_id, id);
        assert!(admin.lookup_user("4243").await.unwrap().is_none());
        assert!(admin.lookup_user("somebody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_rejects_malformed_input() {
        let (_, _, admin) = service();
        let long_handle = "a".repeat(33);
        let long_input = "1".repeat(101);
        for input in ["", "   ", "0", "10000000000", "@", long_handle.as_str(), long_input.as_str()] {
            assert_matches!(
                admin.lookup_user(input).await,
                Err(AnanyaError::Validation { .. }),
                "input {input:?}"
            );
        }
    }

    #[tokio::test]
    async fn details_include_personality_and_history() {
        let (store, _, admin) = service();
        let id = known_user(&store, 11, "asha").await;
        store
            .set_personality_ref(id, Some(&PersonalityId::from("spiritual")))
            .await
            .unwrap();
        store
            .append_turn(id, &Turn::user(&NormalizedRequest::text("namaste")))
            .await
            .unwrap();
        store.append_turn(id, &Turn::assistant("namaste!")).await.unwrap();

        let details = admin.user_details(id).await.unwrap().unwrap();
        assert_eq!(details.active_personality.as_str(), "spiritual");
        assert_eq!(details.turn_count, 2);
        assert_eq!(details.user.message_count, 1);
        assert_eq!(details.days_since_active, 0);

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["userId"], 11);
        assert_eq!(json["activePersonality"], "spiritual");
        assert!(admin.user_details(UserId::new(12)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_stats_only_touches_known_users() {
        let (store, _, admin) = service();
        let id = known_user(&store, 3, "dev").await;
        store
            .append_turn(id, &Turn::user(&NormalizedRequest::text("hi")))
            .await
            .unwrap();

        assert!(admin.reset_user_stats(id).await.unwrap());
        assert_eq!(store.get_user(id).await.unwrap().unwrap().message_count, 0);
        assert!(!admin.reset_user_stats(UserId::new(4)).await.unwrap());
    }

    #[tokio::test]
    async fn update_personality_validates_and_keeps_prompt() {
        let (_, _, admin) = service();
        let before = admin
            .personalities()
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.id.as_str() == "nationalist")
            .unwrap();

        let update = |description: &str, prompt: Option<&str>| PersonalityUpdate {
            description: description.into(),
            prompt: prompt.map(Into::into),
        };

        let updated = admin
            .update_personality(" Nationalist ", update("  Celebrates Indian heritage.  ", Some("   ")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.description, "Celebrates Indian heritage.");
        assert_eq!(updated.system_prompt, before.system_prompt);

        assert_matches!(
            admin.update_personality("nationalist", update("short", None)).await,
            Err(AnanyaError::Validation { .. })
        );
        assert_matches!(
            admin
                .update_personality("nationalist", update("long enough description", Some(&"p".repeat(2001))))
                .await,
            Err(AnanyaError::Validation { .. })
        );
        assert!(
            admin
                .update_personality("pirate", update("long enough description", None))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn direct_message_reaches_one_user() {
        let (store, transport, admin) = service();
        let id = known_user(&store, 21, "meera").await;
        let other = known_user(&store, 22, "ravi").await;

        assert_eq!(admin.send_message(id, "  Your report is ready.  ").await.unwrap(), Some(1));
        assert_eq!(transport.sent_to(id), vec!["Your report is ready."]);
        assert!(transport.sent_to(other).is_empty());
        assert_eq!(admin.send_message(UserId::new(23), "hello").await.unwrap(), None);
    }

    #[tokio::test]
    async fn direct_message_refusals() {
        let (store, transport, admin) = service();
        let id = known_user(&store, 31, "blocked_one").await;
        let _ = admin.block_user(id).await.unwrap();

        assert_matches!(
            admin.send_message(id, "hello").await,
            Err(AnanyaError::Validation { ref message }) if message.contains("blocked")
        );
        assert_matches!(admin.send_message(id, "   ").await, Err(AnanyaError::Validation { .. }));
        assert_matches!(
            admin.send_message(id, &"x".repeat(4001)).await,
            Err(AnanyaError::Validation { .. })
        );
        assert!(transport.sent().is_empty());

        let (store, _, bare) = bare_service();
        let id = known_user(&store, 32, "x").await;
        assert_matches!(bare.send_message(id, "hello").await, Err(AnanyaError::Misconfiguration { .. }));
    }

    #[tokio::test]
    async fn direct_message_to_departed_user_is_permanent() {
        let (store, transport, admin) = service();
        let id = known_user(&store, 41, "gone").await;
        transport.script(id, [SendStep::Permanent("Forbidden: user is deactivated")]);
        assert_matches!(
            admin.send_message(id, "hello").await,
            Err(AnanyaError::PermanentRecipient { .. })
        );
    }
}
