//! Long-poll update loop.
//!
//! Updates are queued per sender in arrival order. A sender with pending
//! messages has exactly one worker task draining its queue; later batches
//! append to that queue instead of starting a second worker. Different
//! senders run concurrently.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use ananya_core::errors::{AnanyaError, Backend};
use ananya_core::ids::UserId;
use ananya_core::media::{MediaRef, RawInput};
use ananya_runtime::ChatEngine;
use ananya_store::UserProfile;
use metrics::counter;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::TelegramClient;
use super::errors::TelegramError;
use super::types::{Message, Update};
use crate::metrics::TELEGRAM_UPDATES_TOTAL;

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";
const DEFAULT_VOICE_MIME: &str = "audio/ogg";
const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";
const DEFAULT_DOCUMENT_MIME: &str = "application/octet-stream";

/// What one message asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// `/start`
    Start,
    /// `/clear`
    Clear,
    /// `/personality [name]`
    Personality(Option<String>),
    /// Plain text.
    Text(String),
    /// Largest photo size.
    Photo {
        /// Download handle.
        file_id: String,
        /// Declared size.
        size: Option<u64>,
        /// Caption.
        caption: Option<String>,
    },
    /// Voice note or audio file.
    Voice {
        /// Download handle.
        file_id: String,
        /// MIME type.
        mime_type: String,
        /// Declared size.
        size: Option<u64>,
    },
    /// File upload.
    Document {
        /// Download handle.
        file_id: String,
        /// MIME type.
        mime_type: String,
        /// Original file name.
        file_name: Option<String>,
        /// Declared size.
        size: Option<u64>,
        /// Caption.
        caption: Option<String>,
    },
    /// Unknown command or unsupported content.
    Ignored,
}

impl Inbound {
    /// Classify a message.
    pub fn from_message(message: &Message) -> Self {
        if let Some(text) = message.text.as_deref() {
            return parse_text(text);
        }
        let caption = message.caption.clone().filter(|c| !c.trim().is_empty());
        if let Some(largest) = message.photo.as_ref().and_then(|sizes| {
            sizes
                .iter()
                .max_by_key(|p| (u64::from(p.width) * u64::from(p.height), p.file_size.unwrap_or(0)))
        }) {
            return Self::Photo {
                file_id: largest.file_id.clone(),
                size: largest.file_size,
                caption,
            };
        }
        if let Some(voice) = &message.voice {
            return Self::Voice {
                file_id: voice.file_id.clone(),
                mime_type: voice.mime_type.clone().unwrap_or_else(|| DEFAULT_VOICE_MIME.into()),
                size: voice.file_size,
            };
        }
        if let Some(audio) = &message.audio {
            return Self::Voice {
                file_id: audio.file_id.clone(),
                mime_type: audio.mime_type.clone().unwrap_or_else(|| DEFAULT_AUDIO_MIME.into()),
                size: audio.file_size,
            };
        }
        if let Some(doc) = &message.document {
            return Self::Document {
                file_id: doc.file_id.clone(),
                mime_type: doc.mime_type.clone().unwrap_or_else(|| DEFAULT_DOCUMENT_MIME.into()),
                file_name: doc.file_name.clone(),
                size: doc.file_size,
                caption,
            };
        }
        Self::Ignored
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Start | Self::Clear | Self::Personality(_) => "command",
            Self::Text(_) => "text",
            Self::Photo { .. } => "image",
            Self::Voice { .. } => "voice",
            Self::Document { .. } => "document",
            Self::Ignored => "ignored",
        }
    }
}

fn parse_text(text: &str) -> Inbound {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('/') {
        return Inbound::Text(text.to_owned());
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or_default();
    let command = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty()).map(str::to_owned);
    match command.as_str() {
        "/start" => Inbound::Start,
        "/clear" => Inbound::Clear,
        "/personality" => Inbound::Personality(arg),
        _ => Inbound::Ignored,
    }
}

type Pending = VecDeque<(UserProfile, Message)>;

/// Drives `getUpdates` and feeds the chat engine.
#[derive(Clone)]
pub struct Poller {
    client: Arc<TelegramClient>,
    engine: Arc<ChatEngine>,
    poll_timeout_secs: u64,
    backlog: Arc<Mutex<HashMap<UserId, Pending>>>,
}

/// Marks a sender's worker. If the worker stops before its queue is empty,
/// the queue is discarded so the next message starts a fresh worker.
struct Worker {
    backlog: Arc<Mutex<HashMap<UserId, Pending>>>,
    user_id: UserId,
    drained: bool,
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.drained {
            return;
        }
        if let Some(lost) = self.backlog.lock().remove(&self.user_id) {
            warn!(user_id = %self.user_id, dropped = lost.len(), "message worker stopped early");
        }
    }
}

impl Poller {
    /// Poller long-polling for `poll_timeout_secs` per request.
    pub fn new(client: Arc<TelegramClient>, engine: Arc<ChatEngine>, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            engine,
            poll_timeout_secs,
            backlog: Arc::default(),
        }
    }

    /// Poll until `cancel` fires, then wait for in-flight messages.
    pub async fn run(self, cancel: CancellationToken) {
        info!(poll_timeout_secs = self.poll_timeout_secs, "telegram poller started");
        let mut offset = None;
        let mut backoff = MIN_BACKOFF;
        let mut tasks = JoinSet::new();

        loop {
            while tasks.try_join_next().is_some() {}

            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.client.get_updates(offset, self.poll_timeout_secs) => result,
            };

            match result {
                Ok(updates) => {
                    backoff = MIN_BACKOFF;
                    if let Some(next) = self.dispatch(updates, &mut tasks) {
                        offset = Some(next);
                    }
                }
                Err(e) => {
                    let delay = match &e {
                        TelegramError::Api {
                            retry_after: Some(d), ..
                        } => *d,
                        _ => backoff,
                    };
                    warn!(error = %e, delay_ms = delay.as_millis() as u64, "getUpdates failed");
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "telegram poller stopping");
        while tasks.join_next().await.is_some() {}
    }

    /// Queue `updates` per sender and start a worker for every sender that
    /// had none. Returns the next offset.
    pub fn dispatch(&self, updates: Vec<Update>, tasks: &mut JoinSet<()>) -> Option<i64> {
        let next_offset = updates.iter().map(|u| u.update_id + 1).max();
        let mut idle = Vec::new();

        {
            let mut backlog = self.backlog.lock();
            for update in updates {
                let Some(message) = update.message else {
                    continue;
                };
                let Some(from) = message.from.as_ref() else {
                    continue;
                };
                if from.is_bot || message.chat.id != from.id {
                    debug!(chat_id = message.chat.id, "ignoring non-private message");
                    continue;
                }
                let profile = UserProfile {
                    user_id: UserId::new(from.id),
                    username: from.username.clone(),
                    first_name: from.first_name.clone(),
                };
                match backlog.entry(profile.user_id) {
                    Entry::Occupied(mut queue) => queue.get_mut().push_back((profile, message)),
                    Entry::Vacant(slot) => {
                        idle.push(profile.user_id);
                        let _ = slot.insert(VecDeque::from([(profile, message)]));
                    }
                }
            }
        }

        for user_id in idle {
            let this = self.clone();
            let _ = tasks.spawn(async move { this.drain(user_id).await });
        }
        next_offset
    }

    /// Number of senders with a running worker.
    pub fn busy_senders(&self) -> usize {
        self.backlog.lock().len()
    }

    async fn drain(&self, user_id: UserId) {
        let mut worker = Worker {
            backlog: Arc::clone(&self.backlog),
            user_id,
            drained: false,
        };
        while let Some((profile, message)) = self.next_pending(user_id) {
            self.handle_message(&profile, &message).await;
        }
        worker.drained = true;
    }

    /// Pop the sender's next message, retiring the queue once it is empty.
    fn next_pending(&self, user_id: UserId) -> Option<(UserProfile, Message)> {
        let mut backlog = self.backlog.lock();
        let next = backlog.get_mut(&user_id)?.pop_front();
        if next.is_none() {
            let _ = backlog.remove(&user_id);
        }
        next
    }

    #[instrument(skip_all, fields(user_id = %profile.user_id, message_id = message.message_id))]
    async fn handle_message(&self, profile: &UserProfile, message: &Message) {
        let inbound = Inbound::from_message(message);
        counter!(TELEGRAM_UPDATES_TOTAL, "kind" => inbound.label()).increment(1);
        let user_id = profile.user_id;

        let result = match inbound {
            Inbound::Start => self.engine.greet(profile).await,
            Inbound::Clear => self.clear(user_id).await,
            Inbound::Personality(None) => self.list_personalities(user_id).await,
            Inbound::Personality(Some(name)) => self.select_personality(user_id, &name).await,
            Inbound::Ignored => {
                debug!("ignoring unsupported message");
                Ok(())
            }
            other => match self.fetch_input(other).await {
                // The engine reports its own failures to the user.
                Ok(input) => {
                    let _ = self.engine.handle_turn(profile, input).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            warn!(code = e.code(), error = %e, "message handling failed");
            if !matches!(e, AnanyaError::PermanentRecipient { .. }) {
                let _ = self.engine.send_text(user_id, &e.user_message()).await;
            }
        }
    }

    async fn clear(&self, user_id: UserId) -> ananya_core::errors::Result<()> {
        self.engine.clear_history(user_id).await?;
        let _ = self.engine.send_text(user_id, "Conversation history cleared.").await?;
        Ok(())
    }

    async fn list_personalities(&self, user_id: UserId) -> ananya_core::errors::Result<()> {
        let current = self.engine.resolver().resolve_or_fallback(user_id).await;
        let catalog = self.engine.personalities().await?;
        let mut text = format!("Current personality: {}\n\nAvailable:\n", current.display_name);
        for profile in &catalog {
            text.push_str(&format!("• {} ({}): {}\n", profile.display_name, profile.id, profile.description));
        }
        text.push_str("\nUse /personality <name> to switch.");
        let _ = self.engine.send_text(user_id, &text).await?;
        Ok(())
    }

    async fn select_personality(&self, user_id: UserId, name: &str) -> ananya_core::errors::Result<()> {
        let profile = self.engine.set_personality(user_id, name).await?;
        let _ = self
            .engine
            .send_text(user_id, &format!("Personality set to {}.", profile.display_name))
            .await?;
        Ok(())
    }

    async fn fetch_input(&self, inbound: Inbound) -> ananya_core::errors::Result<RawInput> {
        let limits = &self.engine.config().input;
        match inbound {
            Inbound::Text(text) => Ok(RawInput::Text { text }),
            Inbound::Photo { file_id, size, caption } => {
                check_size("image", size, limits.max_image_bytes)?;
                let data = self.download(&file_id).await?;
                Ok(RawInput::Image {
                    media: MediaRef::new(DEFAULT_IMAGE_MIME, data),
                    caption,
                })
            }
            Inbound::Voice {
                file_id,
                mime_type,
                size,
            } => {
                check_size("voice message", size, limits.max_audio_bytes)?;
                let data = self.download(&file_id).await?;
                Ok(RawInput::Voice {
                    media: MediaRef::new(mime_type, data),
                })
            }
            Inbound::Document {
                file_id,
                mime_type,
                file_name,
                size,
                caption,
            } => {
                check_size("document", size, limits.max_document_bytes)?;
                let data = self.download(&file_id).await?;
                let mut media = MediaRef::new(mime_type, data);
                if let Some(name) = file_name {
                    media = media.with_file_name(name);
                }
                Ok(RawInput::Document { media, caption })
            }
            Inbound::Start | Inbound::Clear | Inbound::Personality(_) | Inbound::Ignored => {
                Err(AnanyaError::validation("not a chat message"))
            }
        }
    }

    async fn download(&self, file_id: &str) -> ananya_core::errors::Result<bytes::Bytes> {
        self.client
            .fetch_file(file_id)
            .await
            .map_err(|e| AnanyaError::transient(Backend::Transport, format!("file download failed: {e}")))
    }
}

fn check_size(what: &str, size: Option<u64>, max: usize) -> ananya_core::errors::Result<()> {
    match size {
        Some(n) if n > max as u64 => Err(AnanyaError::validation(format!(
            "{what} is too large ({n} bytes, limit {max})"
        ))),
        _ => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::telegram::TelegramTransport;
    use ananya_runtime::EngineConfig;
    use ananya_runtime::test_utils::ScriptedModel;
    use ananya_store::{MemoryStore, UserStore};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "tok";

    fn message(user: i64, id: i64, body: Value) -> Value {
        let mut msg = json!({
            "message_id": id,
            "from": {"id": user, "is_bot": false, "first_name": "Meera"},
            "chat": {"id": user, "type": "private"},
            "date": 0
        });
        if let (Some(target), Some(extra)) = (msg.as_object_mut(), body.as_object()) {
            for (k, v) in extra {
                let _ = target.insert(k.clone(), v.clone());
            }
        }
        msg
    }

    fn updates(items: Vec<(i64, Value)>) -> Vec<Update> {
        items
            .into_iter()
            .map(|(update_id, msg)| serde_json::from_value(json!({"update_id": update_id, "message": msg})).unwrap())
            .collect()
    }

    struct Fixture {
        server: MockServer,
        store: Arc<MemoryStore>,
        model: Arc<ScriptedModel>,
        poller: Poller,
    }

    async fn fixture() -> Fixture {
        fixture_with(ScriptedModel::new()).await
    }

    async fn fixture_with(model: ScriptedModel) -> Fixture {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/sendMessage")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"message_id": 1}})))
            .mount(&server)
            .await;

        let client = Arc::new(TelegramClient::new(server.uri(), TOKEN, Duration::from_secs(2)).unwrap());
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(model);
        let engine = Arc::new(ChatEngine::new(
            store.clone(),
            model.clone(),
            Arc::new(TelegramTransport::new(client.clone())),
            EngineConfig::default(),
        ));
        let poller = Poller::new(client, engine, 0);
        Fixture {
            server,
            store,
            model,
            poller,
        }
    }

    async fn sent_texts(server: &MockServer) -> Vec<(i64, String)> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path().ends_with("/sendMessage"))
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                (
                    body["chat_id"].as_i64().unwrap(),
                    body["text"].as_str().unwrap().to_owned(),
                )
            })
            .collect()
    }

    async fn run_batch(poller: &Poller, batch: Vec<Update>) -> Option<i64> {
        let mut tasks = JoinSet::new();
        let next = poller.dispatch(batch, &mut tasks);
        while tasks.join_next().await.is_some() {}
        next
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_text("/start"), Inbound::Start);
        assert_eq!(parse_text("/clear@AnanyaBot"), Inbound::Clear);
        assert_eq!(parse_text("/personality"), Inbound::Personality(None));
        assert_eq!(
            parse_text("/personality  Spiritual "),
            Inbound::Personality(Some("Spiritual".into()))
        );
        assert_eq!(parse_text("/unknown"), Inbound::Ignored);
        assert_eq!(parse_text("hello /start"), Inbound::Text("hello /start".into()));
    }

    #[test]
    fn picks_largest_photo() {
        let msg: Message = serde_json::from_value(message(
            1,
            1,
            json!({
                "caption": "what is this?",
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90, "file_size": 1000},
                    {"file_id": "large", "width": 1280, "height": 960, "file_size": 90000}
                ]
            }),
        ))
        .unwrap();
        assert_eq!(
            Inbound::from_message(&msg),
            Inbound::Photo {
                file_id: "large".into(),
                size: Some(90000),
                caption: Some("what is this?".into())
            }
        );
    }

    #[test]
    fn maps_voice_and_documents() {
        let voice: Message = serde_json::from_value(message(1, 1, json!({"voice": {"file_id": "v"}}))).unwrap();
        assert_eq!(Inbound::from_message(&voice).label(), "voice");
        assert_matches::assert_matches!(
            Inbound::from_message(&voice),
            Inbound::Voice { mime_type, .. } if mime_type == "audio/ogg"
        );

        let doc: Message = serde_json::from_value(message(
            1,
            2,
            json!({"document": {"file_id": "d", "file_name": "notes.pdf", "mime_type": "application/pdf", "file_size": 10}}),
        ))
        .unwrap();
        assert_matches::assert_matches!(
            Inbound::from_message(&doc),
            Inbound::Document { file_name: Some(name), mime_type, .. } if name == "notes.pdf" && mime_type == "application/pdf"
        );
    }

    #[test]
    fn size_precheck() {
        assert!(check_size("image", Some(11), 10).is_err());
        assert!(check_size("image", Some(10), 10).is_ok());
        assert!(check_size("image", None, 10).is_ok());
    }

    #[tokio::test]
    async fn text_message_gets_a_reply() {
        let f = fixture().await;
        let next = run_batch(&f.poller, updates(vec![(10, message(42, 1, json!({"text": "namaste"})))])).await;

        assert_eq!(next, Some(11));
        assert_eq!(sent_texts(&f.server).await, vec![(42, "echo: namaste".to_owned())]);
        assert_eq!(f.model.calls().len(), 1);
        let user = f.store.get_user(UserId::new(42)).await.unwrap().unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Meera"));
    }

    #[tokio::test]
    async fn same_user_messages_stay_in_order() {
        let f = fixture().await;
        let batch = updates(vec![
            (1, message(7, 1, json!({"text": "one"}))),
            (2, message(8, 2, json!({"text": "other"}))),
            (3, message(7, 3, json!({"text": "two"}))),
            (4, message(7, 4, json!({"text": "three"}))),
        ]);
        let _ = run_batch(&f.poller, batch).await;

        let to_seven: Vec<String> = sent_texts(&f.server)
            .await
            .into_iter()
            .filter(|(chat, _)| *chat == 7)
            .map(|(_, text)| text)
            .collect();
        assert_eq!(to_seven, vec!["echo: one", "echo: two", "echo: three"]);
        let history = f.poller.engine.context().window(UserId::new(7));
        assert_eq!(history.len(), 6);
    }

    #[tokio::test]
    async fn later_batch_waits_behind_earlier_messages() {
        let f = fixture_with(ScriptedModel::with_latency(Duration::from_millis(50))).await;
        let mut tasks = JoinSet::new();
        let _ = f.poller.dispatch(
            updates(vec![
                (1, message(7, 1, json!({"text": "A"}))),
                (2, message(7, 2, json!({"text": "B"}))),
            ]),
            &mut tasks,
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _ = f
            .poller
            .dispatch(updates(vec![(3, message(7, 3, json!({"text": "C"})))]), &mut tasks);
        assert_eq!(tasks.len(), 1);
        while tasks.join_next().await.is_some() {}

        let to_seven: Vec<String> = sent_texts(&f.server).await.into_iter().map(|(_, text)| text).collect();
        assert_eq!(to_seven, vec!["echo: A", "echo: B", "echo: C"]);
        let asked: Vec<String> = f.model.calls().iter().map(|c| c.request.history_text()).collect();
        assert_eq!(asked, vec!["A", "B", "C"]);
        assert_eq!(f.poller.busy_senders(), 0);
    }

    #[tokio::test]
    async fn drained_sender_gets_a_new_worker() {
        let f = fixture().await;
        let _ = run_batch(&f.poller, updates(vec![(1, message(7, 1, json!({"text": "first"})))])).await;
        assert_eq!(f.poller.busy_senders(), 0);
        let _ = run_batch(&f.poller, updates(vec![(2, message(7, 2, json!({"text": "second"})))])).await;
        assert_eq!(
            sent_texts(&f.server).await,
            vec![(7, "echo: first".to_owned()), (7, "echo: second".to_owned())]
        );
    }

    #[tokio::test]
    async fn commands_reach_the_engine() {
        let f = fixture().await;
        let _ = run_batch(
            &f.poller,
            updates(vec![
                (1, message(5, 1, json!({"text": "/start"}))),
                (2, message(5, 2, json!({"text": "/personality spiritual"}))),
                (3, message(5, 3, json!({"text": "/personality"}))),
                (4, message(5, 4, json!({"text": "/clear"}))),
            ]),
        )
        .await;

        let texts: Vec<String> = sent_texts(&f.server).await.into_iter().map(|(_, t)| t).collect();
        assert_eq!(texts.len(), 4);
        assert!(texts[0].starts_with("👋 Hello, Meera!"));
        assert!(texts[1].starts_with("Personality set to"));
        assert!(texts[2].contains("Current personality"));
        assert!(texts[2].contains("(spiritual)"));
        assert_eq!(texts[3], "Conversation history cleared.");
        assert!(f.model.calls().is_empty());
        assert_eq!(
            f.store.personality_ref(UserId::new(5)).await.unwrap().map(|id| id.into_inner()),
            Some("spiritual".to_owned())
        );
    }

    #[tokio::test]
    async fn unknown_personality_is_explained() {
        let f = fixture().await;
        let _ = run_batch(
            &f.poller,
            updates(vec![(1, message(5, 1, json!({"text": "/personality pirate"})))]),
        )
        .await;
        let texts = sent_texts(&f.server).await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("unknown personality"));
    }

    #[tokio::test]
    async fn oversized_photo_is_rejected_before_download() {
        let f = fixture().await;
        let _ = run_batch(
            &f.poller,
            updates(vec![(
                1,
                message(
                    3,
                    1,
                    json!({"photo": [{"file_id": "huge", "width": 4000, "height": 3000, "file_size": 500_000_000u64}]}),
                ),
            )]),
        )
        .await;

        let requests = f.server.received_requests().await.unwrap_or_default();
        assert!(requests.iter().all(|r| !r.url.path().ends_with("/getFile")));
        let texts = sent_texts(&f.server).await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("too large"));
        assert!(f.model.calls().is_empty());
    }

    #[tokio::test]
    async fn voice_note_is_downloaded_and_forwarded() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/getFile")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"file_id": "v1", "file_path": "voice/v1.oga"}
            })))
            .mount(&f.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/file/bot{TOKEN}/voice/v1.oga")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"OggS-voice".to_vec()))
            .mount(&f.server)
            .await;

        let _ = run_batch(
            &f.poller,
            updates(vec![(1, message(4, 1, json!({"voice": {"file_id": "v1", "mime_type": "audio/ogg", "file_size": 10}})))]),
        )
        .await;

        let calls = f.model.calls();
        assert_eq!(calls.len(), 1);
        let media = calls[0].request.media.as_ref().unwrap();
        assert_eq!(media.mime_type, "audio/ogg");
        assert_eq!(&media.data[..], b"OggS-voice");
        assert_eq!(sent_texts(&f.server).await, vec![(4, "echo: [voice message]".to_owned())]);
    }

    #[tokio::test]
    async fn group_and_bot_messages_are_skipped() {
        let f = fixture().await;
        let mut group = message(9, 1, json!({"text": "hi all"}));
        group["chat"] = json!({"id": -100, "type": "group"});
        let mut bot = message(10, 2, json!({"text": "beep"}));
        bot["from"]["is_bot"] = json!(true);

        let next = run_batch(&f.poller, updates(vec![(20, group), (21, bot)])).await;
        assert_eq!(next, Some(22));
        assert!(sent_texts(&f.server).await.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path(format!("/bot{TOKEN}/getUpdates")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": []}))
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&f.server)
            .await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(f.poller.clone().run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(!f.server.received_requests().await.unwrap_or_default().is_empty());
    }
}
