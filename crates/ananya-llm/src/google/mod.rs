//! Google/Gemini provider.
//!
//! `provider` (entry point and request building) and `types` (wire types,
//! configuration).

pub mod provider;
pub mod types;

pub use provider::GoogleProvider;
pub use types::{GenerationConfig, GoogleConfig};
