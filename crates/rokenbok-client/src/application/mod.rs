//! Application layer for the client.
//!
//! - **`key_events`** – Collapses raw key down/up notifications into single
//!   press and release events and parses the textual key protocol read from
//!   stdin.

pub mod key_events;
