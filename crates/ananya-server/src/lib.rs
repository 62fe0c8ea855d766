//! # ananya-server
//!
//! Operator HTTP surface and the chat platform adapter.
//!
//! - Admin API: bearer-authenticated broadcast, user, and catalog operations
//! - `/health` and `/metrics` (Prometheus text)
//! - Telegram Bot API client, [`Transport`](ananya_runtime::Transport) impl, long-poll loop
//! - Shutdown coordination via `CancellationToken`
//!
//! ## Crate Position
//!
//! Depends on: ananya-core, ananya-settings, ananya-store, ananya-runtime.
//! Depended on by: ananya-agent.

#![deny(unsafe_code)]

pub mod admin;
pub mod health;
pub mod metrics;
pub mod platform;
pub mod server;
pub mod shutdown;

pub use server::{AdminServer, AppState};
pub use shutdown::ShutdownCoordinator;
