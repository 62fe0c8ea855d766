//! Personality resolution.
//!
//! A user's stored reference is matched against the catalog on every turn.
//! Absent, unknown, or dangling references resolve to the catalog default.
//! When the catalog cannot be read, [`PersonalityResolver::resolve_or_fallback`]
//! substitutes the compiled-in profile so the turn still proceeds.

use std::sync::Arc;

use ananya_core::errors::{AnanyaError, Result};
use ananya_core::ids::{PersonalityId, UserId};
use ananya_core::personality::{DEFAULT_PERSONALITY_ID, PersonalityProfile};
use ananya_store::UserStore;
use tracing::{error, warn};

/// Maps users to their active personality profile.
pub struct PersonalityResolver {
    store: Arc<dyn UserStore>,
    fallback: PersonalityProfile,
}

impl PersonalityResolver {
    /// Resolver backed by `store` with the compiled-in fallback.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self::with_fallback(store, PersonalityProfile::fallback())
    }

    /// Resolver with a custom fallback profile.
    pub fn with_fallback(store: Arc<dyn UserStore>, fallback: PersonalityProfile) -> Self {
        Self { store, fallback }
    }

    /// Profile used when the catalog is unreachable.
    pub fn fallback(&self) -> &PersonalityProfile {
        &self.fallback
    }

    /// Read the catalog, mapping store failures to `CatalogUnavailable`.
    pub async fn catalog(&self) -> Result<Vec<PersonalityProfile>> {
        self.store
            .catalog()
            .await
            .map_err(|e| AnanyaError::catalog_unavailable(e.to_string()))
    }

    /// Exactly one profile for `user_id`.
    ///
    /// Fails with `CatalogUnavailable` when the store cannot be read and with
    /// `Misconfiguration` when the catalog has no default entry.
    pub async fn resolve(&self, user_id: UserId) -> Result<PersonalityProfile> {
        let reference = self
            .store
            .personality_ref(user_id)
            .await
            .map_err(|e| AnanyaError::catalog_unavailable(e.to_string()))?;
        let catalog = self.catalog().await?;
        select(&catalog, reference.as_ref()).ok_or_else(|| {
            AnanyaError::misconfiguration("personality catalog has no default entry")
        })
    }

    /// Like [`resolve`](Self::resolve) but never fails.
    pub async fn resolve_or_fallback(&self, user_id: UserId) -> PersonalityProfile {
        match self.resolve(user_id).await {
            Ok(profile) => profile,
            Err(err @ AnanyaError::Misconfiguration { .. }) => {
                error!(user_id = %user_id, error = %err, "using fallback personality");
                self.fallback.clone()
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "using fallback personality");
                self.fallback.clone()
            }
        }
    }

    /// Whether `id` may be selected by a user. The default key is always accepted.
    pub async fn is_selectable(&self, id: &PersonalityId) -> Result<bool> {
        if id.as_str() == DEFAULT_PERSONALITY_ID {
            return Ok(true);
        }
        Ok(self.catalog().await?.iter().any(|p| &p.id == id))
    }

    /// Check the catalog holds exactly one default. Returns the catalog size.
    pub async fn verify_catalog(&self) -> Result<usize> {
        let catalog = self.catalog().await?;
        verify(&catalog)?;
        Ok(catalog.len())
    }
}

/// Pick the referenced entry, or the default when the reference is missing or dangling.
pub fn select(catalog: &[PersonalityProfile], reference: Option<&PersonalityId>) -> Option<PersonalityProfile> {
    reference
        .and_then(|id| catalog.iter().find(|p| &p.id == id))
        .or_else(|| catalog.iter().find(|p| p.is_default))
        .cloned()
}

/// Exactly-one-default check.
pub fn verify(catalog: &[PersonalityProfile]) -> Result<()> {
    match catalog.iter().filter(|p| p.is_default).count() {
        1 => Ok(()),
        0 => Err(AnanyaError::misconfiguration("personality catalog has no default entry")),
        n => Err(AnanyaError::misconfiguration(format!(
            "personality catalog has {n} default entries"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
