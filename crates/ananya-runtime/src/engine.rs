//! Chat turn pipeline.
//!
//! One inbound message becomes one turn: gate → registry → block check →
//! normalize → hydrate → window → personality → model → chunk → send →
//! append. Failures end the turn for that user only; the user is told with
//! [`AnanyaError::user_message`] and the error is returned to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ananya_core::constants::{BLOCKED_NOTICE, PERSONA_NAME};
use ananya_core::errors::{AnanyaError, Backend, Result};
use ananya_core::ids::{PersonalityId, UserId};
use ananya_core::media::{NormalizedRequest, RawInput};
use ananya_core::messages::Turn;
use ananya_core::personality::{DEFAULT_PERSONALITY_ID, PersonalityProfile};
use ananya_llm::{LanguageModel, ProviderError, ProviderErrorKind};
use ananya_settings::AnanyaSettings;
use ananya_store::{UserProfile, UserStore};
use ananya_transcription::Transcriber;
use metrics::{counter, histogram};
use tracing::{debug, info, instrument, warn};

use crate::chunker::ResponseChunker;
use crate::context::ContextStore;
use crate::normalizer::{InputLimits, InputNormalizer};
use crate::personality::PersonalityResolver;
use crate::transport::{SendError, Transport};

/// Pipeline tuning.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Turns kept per user.
    pub context_turns: usize,
    /// Users held in the context store.
    pub max_users: usize,
    /// Outbound chunk size in characters.
    pub chunk_limit: usize,
    /// Bound on one model call.
    pub model_timeout: Duration,
    /// Bound on one outbound send.
    pub send_timeout: Duration,
    /// Inbound payload limits.
    pub input: InputLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&AnanyaSettings::default())
    }
}

impl From<&AnanyaSettings> for EngineConfig {
    fn from(settings: &AnanyaSettings) -> Self {
        Self {
            context_turns: settings.context.max_turns,
            max_users: settings.context.max_users,
            chunk_limit: settings.chunking.limit,
            model_timeout: Duration::from_millis(settings.model.timeout_ms),
            send_timeout: Duration::from_millis(settings.broadcast.send_timeout_ms),
            input: InputLimits::from(&settings.input),
        }
    }
}

/// Result of a turn that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnReport {
    /// The model answered and every chunk was delivered.
    Replied {
        /// Personality that shaped the answer.
        personality: PersonalityId,
        /// Messages sent.
        chunks: usize,
    },
    /// The user is blocked; the notice was sent and nothing else happened.
    Refused,
}

/// Runs chat turns against the model and the chat platform.
pub struct ChatEngine {
    context: ContextStore,
    resolver: PersonalityResolver,
    normalizer: InputNormalizer,
    chunker: ResponseChunker,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn UserStore>,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
}

impl ChatEngine {
    /// Engine without speech-to-text.
    pub fn new(
        store: Arc<dyn UserStore>,
        model: Arc<dyn LanguageModel>,
        transport: Arc<dyn Transport>,
        config: EngineConfig,
    ) -> Self {
        Self {
            context: ContextStore::new(config.context_turns, config.max_users),
            resolver: PersonalityResolver::new(Arc::clone(&store)),
            normalizer: InputNormalizer::new(config.input.clone()),
            chunker: ResponseChunker::new(config.chunk_limit),
            model,
            store,
            transport,
            config,
        }
    }

    /// Transcribe voice notes with `transcriber`, bounded by `timeout`.
    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>, timeout: Duration) -> Self {
        self.normalizer = self.normalizer.with_transcriber(transcriber, timeout);
        self
    }

    /// Per-user context windows.
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Personality resolution over the store's catalog.
    pub fn resolver(&self) -> &PersonalityResolver {
        &self.resolver
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one turn for `profile.user_id`.
    ///
    /// Turns for the same user are serialized; different users run in parallel.
    #[instrument(skip_all, fields(user_id = %profile.user_id, kind = %input.kind()))]
    pub async fn handle_turn(&self, profile: &UserProfile, input: RawInput) -> Result<TurnReport> {
        let started = Instant::now();
        let user_id = profile.user_id;
        let result = match self.context.begin_turn(user_id).await {
            Ok(_guard) => self.run_turn(profile, input).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(TurnReport::Replied { .. }) => "replied",
            Ok(TurnReport::Refused) => "refused",
            Err(AnanyaError::Validation { .. }) => "rejected",
            Err(_) => "failed",
        };
        counter!("chat_turns_total", "outcome" => outcome).increment(1);
        histogram!("chat_turn_duration_seconds").record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(user_id = %user_id, code = e.code(), error = %e, "turn failed");
            if !matches!(e, AnanyaError::PermanentRecipient { .. }) {
                self.notify(user_id, &e.user_message()).await;
            }
        }
        result
    }

    async fn run_turn(&self, profile: &UserProfile, input: RawInput) -> Result<TurnReport> {
        let user_id = profile.user_id;
        if let Err(e) = self.store.touch_user(profile).await {
            warn!(user_id = %user_id, error = %e, "failed to record user activity");
        }

        match self.store.is_blocked(user_id).await {
            Ok(true) => {
                info!(user_id = %user_id, "refusing turn from blocked user");
                self.notify(user_id, BLOCKED_NOTICE).await;
                return Ok(TurnReport::Refused);
            }
            Ok(false) => {}
            Err(e) => warn!(user_id = %user_id, error = %e, "block check failed, continuing"),
        }

        let request = self.normalizer.normalize(input).await?;
        self.hydrate(user_id).await;
        let history = self.context.window(user_id);
        let personality = self.resolver.resolve_or_fallback(user_id).await;

        let reply = self.complete(&personality, &history, &request).await?;
        let chunks = self.chunker.chunk(&reply);
        for chunk in &chunks {
            self.send(user_id, chunk).await?;
        }

        self.remember(user_id, Turn::user(&request)).await?;
        self.remember(user_id, Turn::assistant(reply)).await?;
        debug!(
            user_id = %user_id,
            personality = %personality.id,
            chunks = chunks.len(),
            history = history.len(),
            "turn complete"
        );
        Ok(TurnReport::Replied {
            personality: personality.id,
            chunks: chunks.len(),
        })
    }

    async fn complete(
        &self,
        personality: &PersonalityProfile,
        history: &[Turn],
        request: &NormalizedRequest,
    ) -> Result<String> {
        let call = self.model.complete(&personality.system_prompt, history, request);
        let completion = match tokio::time::timeout(self.config.model_timeout, call).await {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => return Err(model_error(&e)),
            Err(_) => {
                return Err(AnanyaError::transient(
                    Backend::Model,
                    format!("model call timed out after {}ms", self.config.model_timeout.as_millis()),
                ));
            }
        };
        if completion.text.trim().is_empty() {
            if completion.finish_reason.is_blocked() {
                return Err(AnanyaError::validation("the reply was withheld by the content filter"));
            }
            return Err(AnanyaError::transient(Backend::Model, "empty response from model"));
        }
        Ok(completion.text)
    }

    async fn send(&self, user_id: UserId, text: &str) -> Result<()> {
        let sent = tokio::time::timeout(self.config.send_timeout, self.transport.send(user_id, text))
            .await
            .unwrap_or_else(|_| Err(SendError::transient("send timed out")));
        match sent {
            Ok(()) => Ok(()),
            Err(SendError::Blocked) => Err(AnanyaError::PermanentRecipient {
                user_id,
                reason: "recipient blocked the bot".into(),
            }),
            Err(SendError::Permanent { reason }) => Err(AnanyaError::PermanentRecipient { user_id, reason }),
            Err(SendError::Transient { reason, .. }) => Err(AnanyaError::transient(Backend::Transport, reason)),
        }
    }

    /// Best-effort message outside the reply path.
    async fn notify(&self, user_id: UserId, text: &str) {
        if let Err(e) = self.send(user_id, text).await {
            debug!(user_id = %user_id, error = %e, "notice not delivered");
        }
    }

    async fn hydrate(&self, user_id: UserId) {
        if !self.context.needs_hydration(user_id) {
            return;
        }
        match self.store.recent_turns(user_id, self.context.cap()).await {
            Ok(turns) => {
                if let Err(e) = self.context.hydrate(user_id, turns) {
                    warn!(user_id = %user_id, error = %e, "context hydration rejected");
                }
            }
            Err(e) => warn!(user_id = %user_id, error = %e, "failed to load persisted history"),
        }
    }

    async fn remember(&self, user_id: UserId, turn: Turn) -> Result<()> {
        if let Err(e) = self.store.append_turn(user_id, &turn).await {
            warn!(user_id = %user_id, error = %e, "failed to persist turn");
        }
        self.context.append(user_id, turn)
    }

    /// Forget the user's conversation, in memory and in the store.
    #[instrument(skip(self))]
    pub async fn clear_history(&self, user_id: UserId) -> Result<()> {
        let _guard = self.context.begin_turn(user_id).await?;
        self.context.clear(user_id);
        self.store.clear_history(user_id).await?;
        info!(user_id = %user_id, "history cleared");
        Ok(())
    }

    /// Register the user and send the welcome message.
    #[instrument(skip_all, fields(user_id = %profile.user_id))]
    pub async fn greet(&self, profile: &UserProfile) -> Result<()> {
        let user_id = profile.user_id;
        if let Err(e) = self.store.touch_user(profile).await {
            warn!(user_id = %user_id, error = %e, "failed to record user activity");
        }
        if self.store.is_blocked(user_id).await.unwrap_or(false) {
            self.notify(user_id, BLOCKED_NOTICE).await;
            return Ok(());
        }
        let name = profile.first_name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or("there");
        let welcome = format!(
            "👋 Hello, {name}!\n\nI'm {PERSONA_NAME}, your friendly AI assistant. How can I help you today?"
        );
        let _ = self.send_text(user_id, &welcome).await?;
        Ok(())
    }

    /// Point the user at catalog entry `name`. `default` clears the reference.
    #[instrument(skip(self))]
    pub async fn set_personality(&self, user_id: UserId, name: &str) -> Result<PersonalityProfile> {
        let id = PersonalityId::normalized(name);
        if !self.resolver.is_selectable(&id).await? {
            return Err(AnanyaError::validation(format!("unknown personality '{id}'")));
        }
        let reference = (id.as_str() != DEFAULT_PERSONALITY_ID).then_some(&id);
        self.store.set_personality_ref(user_id, reference).await?;
        let profile = self.resolver.resolve(user_id).await?;
        info!(user_id = %user_id, personality = %profile.id, "personality changed");
        Ok(profile)
    }

    /// Selectable catalog entries.
    pub async fn personalities(&self) -> Result<Vec<PersonalityProfile>> {
        self.resolver.catalog().await
    }

    /// Send `text` to the user outside a turn, chunked to the platform limit.
    pub async fn send_text(&self, user_id: UserId, text: &str) -> Result<usize> {
        let chunks = self.chunker.chunk(text);
        for chunk in &chunks {
            self.send(user_id, chunk).await?;
        }
        Ok(chunks.len())
    }
}

fn model_error(e: &ProviderError) -> AnanyaError {
    match e.kind() {
        ProviderErrorKind::ContentPolicy => AnanyaError::validation("the request was blocked by the content filter"),
        _ => AnanyaError::transient(Backend::Model, format!("{} ({})", e, e.category())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
