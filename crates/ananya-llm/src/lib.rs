//! # ananya-llm
//!
//! Language model backend abstraction for the Ananya engine.
//!
//! - [`provider::LanguageModel`]: the trait every backend implements
//! - [`provider::ProviderError`]: classified failures (quota, timeout, content policy, transient)
//! - [`google::GoogleProvider`]: Gemini `generateContent` over HTTPS
//! - [`stop_reason`]: finish-reason mapping
//!
//! ## Crate Position
//!
//! Depends on ananya-core. Depended on by ananya-runtime and the binary.

#![deny(unsafe_code)]

pub mod google;
pub mod provider;
pub mod stop_reason;

pub use provider::{Completion, LanguageModel, ProviderError, ProviderErrorKind, ProviderResult};
pub use stop_reason::FinishReason;
