//! # ananya-store
//!
//! Durable state behind the engine: user records, per-user turn history,
//! the personality catalog, and the broadcast archive.
//!
//! Two implementations share the [`UserStore`] and [`BroadcastArchive`]
//! traits:
//!
//! - [`SqliteStore`]: `r2d2`-pooled `SQLite` with embedded migrations.
//!   Blocking database work runs on `spawn_blocking`.
//! - [`MemoryStore`]: process-local maps, used in tests and when no database
//!   path is configured. Can be switched unavailable to exercise failure paths.
//!
//! ## Crate Position
//!
//! Depends on: ananya-core.
//! Depended on by: ananya-runtime, ananya-server, ananya-agent.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{BroadcastArchive, UserCounts, UserProfile, UserRecord, UserStore, normalize_username};
