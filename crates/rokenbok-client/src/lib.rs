//! rokenbok-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does rokenbok-client do? (for beginners)
//!
//! The client borrows one of the hub's eight controller channels.  It:
//!
//! 1. Connects to the server over TCP and waits for START (or FULL, when all
//!    eight controllers are taken).
//! 2. Turns keyboard activity into KEY_PRESS frames.  A key held down is sent
//!    once as pressed and once as released, however long it is held.
//! 3. Shows which vehicle it is driving, as reported by TRUE_SEL.
//! 4. Ends the session with END.

/// Application layer: key event handling.
pub mod application;

/// Infrastructure layer: the TCP session with the server.
pub mod infrastructure;
