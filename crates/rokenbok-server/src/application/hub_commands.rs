//! The command interface a controller slot uses to drive the hub.
//!
//! Connection handlers never touch the serial link directly.  They go through
//! [`HubCommands`], which the serial infrastructure implements on top of the
//! shared `HubState`.  Tests substitute a mock.
//!
//! [`apply_key`] is the per-slot key mapping: it resolves a client key code
//! with [`rokenbok_core::keymap`] and issues the matching command.

use rokenbok_core::keymap::{self, KeyAction};
use rokenbok_core::{Button, Car, Player, Selections};

/// Commands the hub accepts from a controller slot.
#[cfg_attr(test, mockall::automock)]
pub trait HubCommands: Send + Sync {
    /// Presses or releases `button` for `player` (1..=8).  Out-of-range
    /// players are ignored.
    fn cmd(&self, button: Button, player: u8, pressed: bool);

    /// Changes `player`'s desired vehicle.  Returns `false`, leaving state
    /// unchanged, if the vehicle is already taken.
    fn change_selection(&self, player: u8, car: Option<Car>) -> bool;

    /// Observed and desired selections for every player.
    fn selections(&self) -> Selections;

    /// Power-cycles the hub link.  Blocks until the link is open again.
    fn restart_hub(&self);
}

/// What a key event did, for logging and for the caller's follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Button { button: Button, pressed: bool },
    Selected(Car),
    SelectionRejected(Car),
    /// The caller must run [`HubCommands::restart_hub`]; it blocks, so it is
    /// left to the caller to schedule.
    RestartRequested,
    Ignored,
}

/// Applies one key event from `player`'s client to the hub.
pub fn apply_key(hub: &dyn HubCommands, player: Player, code: u8, pressed: bool) -> KeyOutcome {
    let action = if pressed {
        keymap::press_action(code)
    } else {
        keymap::release_action(code)
    };

    match action {
        Some(KeyAction::Button(button)) => {
            hub.cmd(button, player.number(), pressed);
            KeyOutcome::Button { button, pressed }
        }
        Some(KeyAction::Select(car)) => {
            if hub.change_selection(player.number(), Some(car)) {
                KeyOutcome::Selected(car)
            } else {
                KeyOutcome::SelectionRejected(car)
            }
        }
        Some(KeyAction::RestartHub) => KeyOutcome::RestartRequested,
        None => KeyOutcome::Ignored,
    }
}
