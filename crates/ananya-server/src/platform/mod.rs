//! Chat platform adapters.

pub mod telegram;
