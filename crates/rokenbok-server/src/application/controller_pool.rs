//! ControllerPool: hands out the hub's eight controller channels.
//!
//! Each accepted connection borrows exactly one [`ControllerSlot`] for its
//! whole lifetime.  The pool never blocks: when every slot is taken,
//! [`ControllerPool::acquire`] returns [`PoolError::Exhausted`] immediately and
//! the caller rejects the connection with FULL.
//!
//! # Reuse order (for beginners)
//!
//! Free slots live on a stack.  The most recently released slot is the next
//! one handed out, and on a fresh pool player 1 comes first, then 2, and so
//! on.  This keeps active players packed into low player numbers.  Callers
//! must not rely on any other ordering.
//!
//! # Release
//!
//! A [`ControllerSlot`] returns itself to the pool when dropped, after
//! releasing every button the player was holding and clearing its vehicle
//! selection.  Dropping covers every exit path of a connection handler,
//! including panics, so a slot can never leak.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rokenbok_core::{HubState, Player, PLAYER_COUNT};
use thiserror::Error;
use tracing::debug;

/// Error type for pool allocation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("all {0} controller slots are in use")]
    Exhausted(usize),
}

/// Fixed pool of controller channels shared by every connection.
pub struct ControllerPool {
    free: Mutex<Vec<Player>>,
    hub: Arc<HubState>,
}

impl ControllerPool {
    /// Creates a pool with all eight players free.
    pub fn new(hub: Arc<HubState>) -> Arc<Self> {
        // Pushed 8..1 so player 1 is on top.
        let free = Player::all().rev().collect();
        Arc::new(Self {
            free: Mutex::new(free),
            hub,
        })
    }

    /// Takes a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] when every slot is taken.
    pub fn acquire(self: &Arc<Self>) -> Result<ControllerSlot, PoolError> {
        let player = self
            .lock_free()
            .pop()
            .ok_or(PoolError::Exhausted(PLAYER_COUNT))?;
        debug!("{player} acquired");
        Ok(ControllerSlot {
            player,
            pool: Arc::clone(self),
        })
    }

    /// Resets `slot` to neutral and makes it available again.
    ///
    /// Equivalent to dropping the slot.
    pub fn release(&self, slot: ControllerSlot) {
        drop(slot);
    }

    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        self.lock_free().len()
    }

    fn give_back(&self, player: Player) {
        self.hub.release_player(player);
        self.lock_free().push(player);
        debug!("{player} released");
    }

    fn lock_free(&self) -> MutexGuard<'_, Vec<Player>> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive ownership of one controller channel.
///
/// Not `Clone`: there is exactly one owner between acquire and release.
pub struct ControllerSlot {
    player: Player,
    pool: Arc<ControllerPool>,
}

impl ControllerSlot {
    /// The player number (1..=8) this slot drives.
    pub fn player(&self) -> Player {
        self.player
    }
}

impl fmt::Debug for ControllerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSlot")
            .field("player", &self.player)
            .finish()
    }
}

impl Drop for ControllerSlot {
    fn drop(&mut self) {
        self.pool.give_back(self.player);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
