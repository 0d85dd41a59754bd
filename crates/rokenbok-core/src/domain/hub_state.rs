//! The hub's shared control state.
//!
//! [`HubState`] is the single owned store that every connection handler writes
//! to and the serial sync loop reads from.  It holds:
//!
//! - one bitmask per [`Button`], where bit `p` is the press state most recently
//!   commanded for player `p + 1`;
//! - the *desired* selection of every player (what the player asked for);
//! - the *observed* selection of every player (what was last delivered to the
//!   hub over the serial link).
//!
//! # Locking model
//!
//! Atomicity is per field, not per store.  Each button mask is an `AtomicU8`
//! updated with `fetch_or` / `fetch_and`, so two players pressing different
//! buttons (or the same button) never contend on a lock and never lose an
//! update.  The selections sit behind one `Mutex` because claiming a vehicle
//! is a check-then-set across all eight entries.
//!
//! A [`HubSnapshot`] therefore never contains half of a single command, but
//! two commands issued at the same instant may land in different sync frames.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::domain::player::{selection_wire_byte, Car, Player, PLAYER_COUNT};

// ── Serial frame layout ───────────────────────────────────────────────────────

/// Marker byte sent twice at the start of every sync frame.
pub const SYNC_MARKER: u8 = 0b1010_1010;

/// Number of button kinds on a controller.
pub const BUTTON_COUNT: usize = 10;

/// Bytes per sync frame: 2 markers + 10 masks + 1 priority + 8 selections.
pub const SYNC_FRAME_LEN: usize = 2 + BUTTON_COUNT + 1 + PLAYER_COUNT;

/// One complete sync frame for the serial link.
pub type SyncFrame = [u8; SYNC_FRAME_LEN];

// ── Buttons ───────────────────────────────────────────────────────────────────

/// Every button on a Rokenbok controller, in serial-frame order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Forward,
    Back,
    Left,
    Right,
    A,
    B,
    X,
    Y,
    Slow,
    Sharing,
}

impl Button {
    /// All buttons in the order their masks appear in a sync frame.
    pub const ALL: [Button; BUTTON_COUNT] = [
        Button::Forward,
        Button::Back,
        Button::Left,
        Button::Right,
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::Slow,
        Button::Sharing,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons a selection change is refused.  State is unchanged in every case.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("player {0} is outside 1..=8")]
    InvalidPlayer(u8),

    #[error("{car} is already selected by {holder}")]
    Conflict { car: Car, holder: Player },
}

// ── Read models ───────────────────────────────────────────────────────────────

/// Observed and desired selections for status reporting.
///
/// Index `n` belongs to player `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selections {
    pub observed: [Option<Car>; PLAYER_COUNT],
    pub desired: [Option<Car>; PLAYER_COUNT],
}

/// Everything needed to build one sync frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HubSnapshot {
    /// Button masks indexed like [`Button::ALL`].
    pub buttons: [u8; BUTTON_COUNT],
    pub desired: [Option<Car>; PLAYER_COUNT],
}

impl HubSnapshot {
    pub fn button_mask(&self, button: Button) -> u8 {
        self.buttons[button.index()]
    }

    /// Serialises the snapshot for the serial link.
    ///
    /// ```text
    /// [0xAA][0xAA][forward][back][left][right][a][b][x][y][slow][sharing]
    /// [priority][sel p1]..[sel p8]
    /// ```
    /// Selections are 0-based vehicle numbers, `0xFF` for none.
    pub fn to_sync_frame(&self, priority: u8) -> SyncFrame {
        let mut frame = [0u8; SYNC_FRAME_LEN];
        frame[0] = SYNC_MARKER;
        frame[1] = SYNC_MARKER;
        frame[2..2 + BUTTON_COUNT].copy_from_slice(&self.buttons);
        frame[2 + BUTTON_COUNT] = priority;
        for (slot, selection) in frame[3 + BUTTON_COUNT..].iter_mut().zip(self.desired) {
            *slot = selection_wire_byte(selection);
        }
        frame
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Shared control state for the whole hub.  Wrap in an `Arc` to share.
#[derive(Debug, Default)]
pub struct HubState {
    buttons: [AtomicU8; BUTTON_COUNT],
    selections: Mutex<Selections>,
}

impl HubState {
    /// Creates a store with every button released and nothing selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears exactly bit `player - 1` of `button`'s mask.
    ///
    /// Does nothing if `player` is outside `1..=8`.
    pub fn set_button(&self, button: Button, player: u8, pressed: bool) {
        let Some(player) = Player::new(player) else {
            return;
        };
        let field = &self.buttons[button.index()];
        if pressed {
            field.fetch_or(player.mask(), Ordering::AcqRel);
        } else {
            field.fetch_and(!player.mask(), Ordering::AcqRel);
        }
    }

    /// Current mask for one button.
    pub fn button_mask(&self, button: Button) -> u8 {
        self.buttons[button.index()].load(Ordering::Acquire)
    }

    /// Changes `player`'s desired vehicle.
    ///
    /// `None` always succeeds and frees the player's vehicle.
    ///
    /// # Errors
    ///
    /// [`SelectionError::Conflict`] if `car` is already selected by any player
    /// (including `player` itself), [`SelectionError::InvalidPlayer`] if
    /// `player` is outside `1..=8`.
    pub fn set_selection(&self, player: u8, car: Option<Car>) -> Result<(), SelectionError> {
        let who = Player::new(player).ok_or(SelectionError::InvalidPlayer(player))?;
        let mut selections = self.lock_selections();
        if let Some(car) = car {
            if let Some(index) = selections.desired.iter().position(|s| *s == Some(car)) {
                let holder = Player::from_index(index).ok_or(SelectionError::InvalidPlayer(player))?;
                return Err(SelectionError::Conflict { car, holder });
            }
        }
        selections.desired[who.index()] = car;
        Ok(())
    }

    /// Returns both the observed and desired selections.
    pub fn selections(&self) -> Selections {
        *self.lock_selections()
    }

    /// Takes a snapshot for one sync frame.
    pub fn snapshot(&self) -> HubSnapshot {
        let mut buttons = [0u8; BUTTON_COUNT];
        for (out, field) in buttons.iter_mut().zip(&self.buttons) {
            *out = field.load(Ordering::Acquire);
        }
        HubSnapshot {
            buttons,
            desired: self.lock_selections().desired,
        }
    }

    /// Records that `snapshot` has been written to the hub, making its
    /// selections the observed ones.
    pub fn record_delivered(&self, snapshot: &HubSnapshot) {
        self.lock_selections().observed = snapshot.desired;
    }

    /// Forgets what the hub was last told.  Called when the link restarts and
    /// the device reboots into a blank state.
    pub fn clear_observed(&self) {
        self.lock_selections().observed = [None; PLAYER_COUNT];
    }

    /// Releases every button held by `player` and clears its selection.
    pub fn release_player(&self, player: Player) {
        for field in &self.buttons {
            field.fetch_and(!player.mask(), Ordering::AcqRel);
        }
        self.lock_selections().desired[player.index()] = None;
    }

    /// Releases every button for every player and clears every selection.
    pub fn release_all(&self) {
        for field in &self.buttons {
            field.store(0, Ordering::Release);
        }
        self.lock_selections().desired = [None; PLAYER_COUNT];
    }

    // A panic while holding the lock cannot leave the array half-written, so
    // the poisoned value is still consistent.
    fn lock_selections(&self) -> MutexGuard<'_, Selections> {
        self.selections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
