//! KeyListener: turns raw keyboard activity into press/release events.
//!
//! Keyboards auto-repeat: holding a key produces a stream of "down"
//! notifications.  The server only needs to know when a key goes down and
//! when it comes back up, so the listener remembers which keys are held and
//! drops the repeats.
//!
//! The binary feeds the listener from stdin, one key per line:
//!
//! ```text
//! +up      up arrow pressed
//! -up      up arrow released
//! +3       select vehicle 3
//! +r       restart the hub
//! ```

use std::collections::HashSet;

use rokenbok_core::keymap;
use thiserror::Error;
use tokio::sync::mpsc;

/// One key transition to forward to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: u8,
    pub pressed: bool,
}

/// Error type for parsing a key line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyLineError {
    #[error("empty key line")]
    Empty,

    #[error("key line {0:?} must start with '+' or '-'")]
    MissingDirection(String),

    #[error("unknown key {0:?}")]
    UnknownKey(String),
}

/// Parses `+name` / `-name` into a key event.
///
/// # Errors
///
/// Returns [`KeyLineError`] when the line is empty, lacks the direction
/// prefix, or names a key with no wire code.
pub fn parse_key_line(line: &str) -> Result<KeyEvent, KeyLineError> {
    let line = line.trim();
    let mut chars = line.chars();
    let pressed = match chars.next() {
        None => return Err(KeyLineError::Empty),
        Some('+') => true,
        Some('-') => false,
        Some(_) => return Err(KeyLineError::MissingDirection(line.to_string())),
    };
    let name = chars.as_str().trim();
    let code = keymap::code_for_key_name(name).ok_or_else(|| KeyLineError::UnknownKey(name.to_string()))?;
    Ok(KeyEvent { code, pressed })
}

/// De-duplicates held keys and forwards transitions on a channel.
pub struct KeyListener {
    held: HashSet<u8>,
    tx: mpsc::UnboundedSender<KeyEvent>,
}

impl KeyListener {
    pub fn new(tx: mpsc::UnboundedSender<KeyEvent>) -> Self {
        Self {
            held: HashSet::new(),
            tx,
        }
    }

    /// Key went down.  Returns `true` if an event was forwarded, `false` for
    /// a repeat of a key already held or when the receiver is gone.
    pub fn on_press(&mut self, code: u8) -> bool {
        if !self.held.insert(code) {
            return false;
        }
        self.forward(KeyEvent { code, pressed: true })
    }

    /// Key came up.  Releases of keys that were never pressed are dropped.
    pub fn on_release(&mut self, code: u8) -> bool {
        if !self.held.remove(&code) {
            return false;
        }
        self.forward(KeyEvent { code, pressed: false })
    }

    /// Routes a parsed event to [`on_press`](Self::on_press) or
    /// [`on_release`](Self::on_release).
    pub fn handle(&mut self, event: KeyEvent) -> bool {
        if event.pressed {
            self.on_press(event.code)
        } else {
            self.on_release(event.code)
        }
    }

    /// Releases every held key, e.g. when input ends.
    pub fn release_all(&mut self) {
        let mut held: Vec<u8> = self.held.drain().collect();
        held.sort_unstable();
        for code in held {
            self.forward(KeyEvent { code, pressed: false });
        }
    }

    /// `true` once the receiving session has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn forward(&self, event: KeyEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
