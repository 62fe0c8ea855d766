//! Per-user rolling context.
//!
//! Each user owns a FIFO window of at most `cap` turns. Reads never mutate.
//! Appends from concurrent turns of one user are serialized by the turn gate
//! returned from [`ContextStore::begin_turn`]; distinct users share no lock
//! beyond the `DashMap` shard that holds their slot.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ananya_core::errors::{AnanyaError, Result};
use ananya_core::ids::UserId;
use ananya_core::messages::Turn;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

/// Resource name reported when the user limit is hit.
pub const CONTEXT_USERS_RESOURCE: &str = "context_users";

#[derive(Default)]
struct Window {
    turns: VecDeque<Turn>,
    hydrated: bool,
}

struct Slot {
    window: Mutex<Window>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            window: Mutex::new(Window::default()),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// Exclusive right to run one turn for a user. Released on drop.
pub struct TurnGuard {
    user_id: UserId,
    _permit: OwnedMutexGuard<()>,
}

impl TurnGuard {
    /// User this guard belongs to.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// Bounded per-user turn windows.
pub struct ContextStore {
    cap: usize,
    max_users: usize,
    slots: DashMap<UserId, Arc<Slot>>,
    occupied: AtomicUsize,
}

impl ContextStore {
    /// Store holding at most `cap` turns per user for at most `max_users` users.
    pub fn new(cap: usize, max_users: usize) -> Self {
        Self {
            cap: cap.max(1),
            max_users: max_users.max(1),
            slots: DashMap::new(),
            occupied: AtomicUsize::new(0),
        }
    }

    /// Per-user turn cap.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of users with a slot.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no user has a slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, user_id: UserId) -> Result<Arc<Slot>> {
        if let Some(slot) = self.slots.get(&user_id) {
            return Ok(Arc::clone(slot.value()));
        }
        // Reserved under the shard lock: the slot count never exceeds `max_users`.
        match self.slots.entry(user_id) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let limit = self.max_users;
                if self
                    .occupied
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < limit).then_some(n + 1))
                    .is_err()
                {
                    return Err(AnanyaError::Capacity {
                        resource: CONTEXT_USERS_RESOURCE,
                        limit,
                    });
                }
                Ok(Arc::clone(e.insert(Arc::new(Slot::new())).value()))
            }
        }
    }

    /// Wait for exclusive access to the user's turn pipeline.
    ///
    /// Creates the slot lazily; fails with `Capacity` when the store is full.
    pub async fn begin_turn(&self, user_id: UserId) -> Result<TurnGuard> {
        let gate = Arc::clone(&self.slot(user_id)?.gate);
        let permit = gate.lock_owned().await;
        Ok(TurnGuard {
            user_id,
            _permit: permit,
        })
    }

    /// Append a turn, evicting the oldest one when the window is full.
    pub fn append(&self, user_id: UserId, turn: Turn) -> Result<()> {
        let slot = self.slot(user_id)?;
        let mut window = slot.window.lock();
        window.turns.push_back(turn);
        while window.turns.len() > self.cap {
            let _ = window.turns.pop_front();
        }
        Ok(())
    }

    /// Up to `cap` most recent turns, oldest first.
    pub fn window(&self, user_id: UserId) -> Vec<Turn> {
        self.slots.get(&user_id).map_or_else(Vec::new, |slot| {
            slot.window.lock().turns.iter().cloned().collect()
        })
    }

    /// Whether the user's window still needs loading from persistence.
    pub fn needs_hydration(&self, user_id: UserId) -> bool {
        self.slots
            .get(&user_id)
            .is_none_or(|slot| !slot.window.lock().hydrated)
    }

    /// Seed the window from persisted turns (oldest first).
    ///
    /// Persisted turns go in front of anything already in memory. Returns
    /// `false` if the window was already hydrated.
    pub fn hydrate(&self, user_id: UserId, persisted: Vec<Turn>) -> Result<bool> {
        let slot = self.slot(user_id)?;
        let mut window = slot.window.lock();
        if window.hydrated {
            return Ok(false);
        }
        let loaded = persisted.len();
        let mut turns: VecDeque<Turn> = persisted.into();
        turns.extend(window.turns.drain(..));
        while turns.len() > self.cap {
            let _ = turns.pop_front();
        }
        window.turns = turns;
        window.hydrated = true;
        debug!(user_id = %user_id, loaded, "hydrated context window");
        Ok(true)
    }

    /// Drop every turn for the user. The slot stays and counts as hydrated.
    pub fn clear(&self, user_id: UserId) {
        if let Some(slot) = self.slots.get(&user_id) {
            let mut window = slot.window.lock();
            window.turns.clear();
            window.hydrated = true;
        }
    }

    /// Delete the user's slot entirely.
    pub fn remove(&self, user_id: UserId) -> bool {
        let removed = self.slots.remove(&user_id).is_some();
        if removed {
            let _ = self.occupied.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
