//! Speech-to-text for inbound voice notes.
//!
//! The runtime only sees the [`Transcriber`] trait; [`SidecarTranscriber`]
//! posts audio to an HTTP transcription sidecar (`POST /transcribe`).
//!
//! ## Crate Position
//!
//! Standalone (no ananya crate dependencies).
//! Depended on by: ananya-runtime, ananya-agent.

#![deny(unsafe_code)]

pub mod service;
pub mod sidecar;
pub mod types;

pub use service::Transcriber;
pub use sidecar::SidecarTranscriber;
pub use types::{ResultExt, TranscriptionError, TranscriptionResult};
