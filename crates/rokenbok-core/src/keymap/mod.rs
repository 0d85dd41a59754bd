//! Key code translation table.
//!
//! Clients send raw key codes in KEY_PRESS frames.  The server resolves each
//! code, per controller slot, to one [`KeyAction`]:
//!
//! | Code | Key | Action |
//! |---|---|---|
//! | 24 | up arrow | [`Button::Forward`] |
//! | 25 | down arrow | [`Button::Back`] |
//! | 26 | right arrow | [`Button::Right`] |
//! | 27 | left arrow | [`Button::Left`] |
//! | `s` / `w` / `a` / `d` | | [`Button::A`] / [`Button::B`] / [`Button::X`] / [`Button::Y`] |
//! | `q` | | [`Button::Slow`] |
//! | `1`..`8` | number row | select vehicle 1..8 (press only) |
//! | `r` | | restart the hub link (press only) |
//!
//! Every other code is ignored.

use crate::domain::hub_state::Button;
use crate::domain::player::Car;

/// Reserved code for the up arrow key.
pub const KEY_UP: u8 = 24;
/// Reserved code for the down arrow key.
pub const KEY_DOWN: u8 = 25;
/// Reserved code for the right arrow key.
pub const KEY_RIGHT: u8 = 26;
/// Reserved code for the left arrow key.
pub const KEY_LEFT: u8 = 27;

const KEY_RESTART: u8 = b'r';

/// What a key press means for the pressing player's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Button(Button),
    Select(Car),
    RestartHub,
}

/// Returns the button bound to `code`, if any.
pub fn button_for(code: u8) -> Option<Button> {
    let button = match code {
        KEY_UP => Button::Forward,
        KEY_DOWN => Button::Back,
        KEY_RIGHT => Button::Right,
        KEY_LEFT => Button::Left,
        b's' => Button::A,
        b'w' => Button::B,
        b'a' => Button::X,
        b'd' => Button::Y,
        b'q' => Button::Slow,
        _ => return None,
    };
    Some(button)
}

/// Resolves a key press.
pub fn press_action(code: u8) -> Option<KeyAction> {
    if let Some(button) = button_for(code) {
        return Some(KeyAction::Button(button));
    }
    match code {
        b'1'..=b'8' => Car::new(code - b'0').map(KeyAction::Select),
        KEY_RESTART => Some(KeyAction::RestartHub),
        _ => None,
    }
}

/// Resolves a key release.  Only button keys act on release.
pub fn release_action(code: u8) -> Option<KeyAction> {
    button_for(code).map(KeyAction::Button)
}

/// Maps a key name to its wire code.
///
/// Single printable ASCII characters map to themselves; `"up"`, `"down"`,
/// `"right"` and `"left"` map to the reserved arrow codes.
pub fn code_for_key_name(name: &str) -> Option<u8> {
    match name {
        "up" => Some(KEY_UP),
        "down" => Some(KEY_DOWN),
        "right" => Some(KEY_RIGHT),
        "left" => Some(KEY_LEFT),
        _ => {
            let mut bytes = name.bytes();
            match (bytes.next(), bytes.next()) {
                (Some(b), None) if b.is_ascii_graphic() => Some(b),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_keys_map_to_drive_buttons() {
        assert_eq!(press_action(24), Some(KeyAction::Button(Button::Forward)));
        assert_eq!(press_action(25), Some(KeyAction::Button(Button::Back)));
        assert_eq!(press_action(26), Some(KeyAction::Button(Button::Right)));
        assert_eq!(press_action(27), Some(KeyAction::Button(Button::Left)));
    }

    #[test]
    fn test_number_keys_select_matching_car() {
        assert_eq!(press_action(b'1'), Car::new(1).map(KeyAction::Select));
        assert_eq!(press_action(b'8'), Car::new(8).map(KeyAction::Select));
    }

    #[test]
    fn test_number_keys_outside_one_to_eight_are_ignored() {
        assert_eq!(press_action(b'0'), None);
        assert_eq!(press_action(b'9'), None);
        assert_eq!(press_action(b'z'), None);
    }

    #[test]
    fn test_restart_key_only_acts_on_press() {
        assert_eq!(press_action(b'r'), Some(KeyAction::RestartHub));
        assert_eq!(release_action(b'r'), None);
    }

    #[test]
    fn test_release_of_number_key_does_nothing() {
        assert_eq!(release_action(b'3'), None);
        assert_eq!(release_action(b'q'), Some(KeyAction::Button(Button::Slow)));
    }

    #[test]
    fn test_code_for_key_name() {
        assert_eq!(code_for_key_name("up"), Some(24));
        assert_eq!(code_for_key_name("w"), Some(b'w'));
        assert_eq!(code_for_key_name("shift"), None);
        assert_eq!(code_for_key_name(" "), None);
    }
}
