//! # ananya-runtime
//!
//! Conversation state and broadcast dispatch.
//!
//! - **Context store**: bounded per-user turn windows with a per-user turn gate
//! - **Personality resolver**: user reference → catalog profile, default fallback
//! - **Input normalizer**: text / image / voice / document → [`NormalizedRequest`]
//! - **Response chunker**: model output → platform-sized messages
//! - **Broadcast dispatcher**: rate-limited, retried fan-out with per-recipient outcomes
//! - **Delivery ledger**: summaries of finished broadcasts, archived through the store
//! - **Chat engine**: the full turn pipeline over those pieces
//! - **Admin service**: operator actions (block, catalog, broadcast, stats)
//!
//! ## Crate Position
//!
//! Depends on: ananya-core, ananya-settings, ananya-llm, ananya-transcription, ananya-store.
//! Depended on by: ananya-server, ananya-agent.
//!
//! [`NormalizedRequest`]: ananya_core::media::NormalizedRequest

#![deny(unsafe_code)]

pub mod admin;
pub mod broadcast;
pub mod chunker;
pub mod context;
pub mod engine;
pub mod ledger;
pub mod normalizer;
pub mod personality;
pub mod test_utils;
pub mod transport;

pub use admin::{AdminService, AdminStats, BroadcastView, NewPersonality, PersonalityUpdate, UserDetails};
pub use broadcast::{BroadcastConfig, BroadcastDispatcher, BroadcastJob, JobSnapshot};
pub use chunker::ResponseChunker;
pub use context::{ContextStore, TurnGuard};
pub use engine::{ChatEngine, EngineConfig, TurnReport};
pub use ledger::DeliveryLedger;
pub use normalizer::{InputLimits, InputNormalizer};
pub use personality::PersonalityResolver;
pub use transport::{SendError, Transport};
