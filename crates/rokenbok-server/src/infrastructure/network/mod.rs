//! Network infrastructure for the hub server.
//!
//! # Sub-modules
//!
//! - **`acceptor`** – Listens for TCP clients, performs the START/FULL
//!   handshake against the controller pool, and spawns one connection handler
//!   per admitted client.

pub mod acceptor;
