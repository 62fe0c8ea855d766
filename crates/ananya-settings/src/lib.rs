//! # ananya-settings
//!
//! Configuration management with layered sources for the Ananya engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AnanyaSettings::default()`]
//! 2. **User file**: `~/.ananya/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ANANYA_*` overrides (highest priority)
//!
//! The global singleton is reloadable: [`reload_settings_from_path`] swaps the
//! cached value so all subsequent [`get_settings`] calls return fresh data.
//!
//! ## Crate Position
//!
//! Depends on ananya-core only. Depended on by ananya-runtime, ananya-server
//! and the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_dir, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<..>>>` instead of `OnceLock` so the cached value can be
/// swapped on reload.
static SETTINGS: RwLock<Option<Arc<AnanyaSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads settings from disk with env var overrides. If loading
/// fails, returns compiled defaults.
pub fn get_settings() -> Arc<AnanyaSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            AnanyaSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
pub fn init_settings(settings: AnanyaSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Reload settings from a specific file path and swap the global cache.
pub fn reload_settings_from_path(path: &Path) {
    let new = Arc::new(match load_settings_from_path(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            AnanyaSettings::default()
        }
    });
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(new);
    tracing::info!(?path, "settings reloaded from disk");
}

/// Reset the global settings cache (test-only).
#[cfg(test)]
pub(crate) fn reset_settings() {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that mutate the global SETTINGS static must hold this lock.
    static SETTINGS_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn init_settings_sets_custom_value() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        let mut custom = AnanyaSettings::default();
        custom.server.port = 9999;
        init_settings(custom);
        assert_eq!(get_settings().server.port, 9999);
        reset_settings();
    }

    #[test]
    fn reload_settings_from_path_updates_cached_value() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(AnanyaSettings::default());
        assert_eq!(get_settings().broadcast.workers, 8);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"broadcast": {"workers": 4}}"#).unwrap();
        reload_settings_from_path(&path);

        let updated = get_settings();
        assert_eq!(updated.broadcast.workers, 4);
        assert_eq!(updated.broadcast.max_retries, 2);
        reset_settings();
    }

    #[test]
    fn reload_from_invalid_file_falls_back_to_defaults() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        let mut custom = AnanyaSettings::default();
        custom.context.max_turns = 3;
        init_settings(custom);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "][").unwrap();
        reload_settings_from_path(&path);

        assert_eq!(get_settings().context.max_turns, 10);
        reset_settings();
    }

    #[test]
    fn get_settings_returns_arc_for_snapshot_isolation() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(AnanyaSettings::default());
        let snapshot = get_settings();

        let mut new = AnanyaSettings::default();
        new.server.port = 5555;
        init_settings(new);

        assert_eq!(snapshot.server.port, 8080);
        assert_eq!(get_settings().server.port, 5555);
        reset_settings();
    }
}
