//! Telegram Bot API adapter.
//!
//! - [`TelegramClient`]: `sendMessage`, `getUpdates`, `getFile`, file download
//! - [`TelegramTransport`]: delivery with blocked/transient/permanent classification
//! - [`Poller`]: long-poll loop feeding the chat engine

pub mod client;
pub mod errors;
pub mod poller;
pub mod transport;
pub mod types;

pub use client::TelegramClient;
pub use errors::TelegramError;
pub use poller::{Inbound, Poller};
pub use transport::{TelegramTransport, classify};
