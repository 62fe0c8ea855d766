//! Scripted collaborators for tests.
//!
//! [`ScriptedTransport`] plays back per-user send behavior and records every
//! attempt. [`ScriptedModel`] answers from a queue and records every call.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use ananya_core::ids::UserId;
use ananya_core::media::NormalizedRequest;
use ananya_core::messages::Turn;
use ananya_llm::{Completion, LanguageModel, ProviderResult};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::transport::{SendError, Transport};

/// One scripted send result.
#[derive(Clone, Debug)]
pub enum SendStep {
    /// Accept the message.
    Deliver,
    /// Report the recipient as blocked.
    Blocked,
    /// Fail transiently.
    Transient(&'static str),
    /// Fail transiently with a platform retry hint.
    RetryAfter(Duration),
    /// Fail permanently.
    Permanent(&'static str),
    /// Never complete.
    Hang,
}

/// Transport that replays scripted steps per user, then delivers.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<UserId, VecDeque<SendStep>>>,
    attempts: Mutex<HashMap<UserId, usize>>,
    sent: Mutex<Vec<(UserId, String)>>,
}

impl ScriptedTransport {
    /// Transport that delivers everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue steps for `user_id`. Once exhausted, sends succeed.
    pub fn script(&self, user_id: UserId, steps: impl IntoIterator<Item = SendStep>) {
        self.scripts.lock().entry(user_id).or_default().extend(steps);
    }

    /// Successfully delivered messages in send order.
    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().clone()
    }

    /// Messages delivered to one user.
    pub fn sent_to(&self, user_id: UserId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Send attempts made for `user_id`, successful or not.
    pub fn attempts(&self, user_id: UserId) -> usize {
        self.attempts.lock().get(&user_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), SendError> {
        *self.attempts.lock().entry(user_id).or_insert(0) += 1;
        let step = self
            .scripts
            .lock()
            .get_mut(&user_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(SendStep::Deliver);

        match step {
            SendStep::Deliver => {
                self.sent.lock().push((user_id, text.to_owned()));
                Ok(())
            }
            SendStep::Blocked => Err(SendError::Blocked),
            SendStep::Transient(reason) => Err(SendError::transient(reason)),
            SendStep::RetryAfter(delay) => Err(SendError::Transient {
                reason: "too many requests".into(),
                retry_after: Some(delay),
            }),
            SendStep::Permanent(reason) => Err(SendError::permanent(reason)),
            SendStep::Hang => std::future::pending().await,
        }
    }
}

/// What the model was asked.
#[derive(Clone, Debug)]
pub struct ModelCall {
    /// System prompt from the resolved personality.
    pub system_prompt: String,
    /// Prior turns, oldest first.
    pub history: Vec<Turn>,
    /// The current request.
    pub request: NormalizedRequest,
}

/// Model that answers from a queue, echoing the request once the queue is empty.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ProviderResult<Completion>>>,
    calls: Mutex<Vec<ModelCall>>,
    latency: Duration,
}

impl ScriptedModel {
    /// Echoing model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoing model that takes `latency` to answer.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queue a reply.
    pub fn reply(&self, result: ProviderResult<Completion>) {
        self.replies.lock().push_back(result);
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        request: &NormalizedRequest,
    ) -> ProviderResult<Completion> {
        self.calls.lock().push(ModelCall {
            system_prompt: system_prompt.to_owned(),
            history: history.to_vec(),
            request: request.clone(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let queued = self.replies.lock().pop_front();
        queued.unwrap_or_else(|| Ok(Completion::end_turn(format!("echo: {}", request.history_text()))))
    }
}
