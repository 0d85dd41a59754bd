//! rokenbok-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # Layers
//!
//! - **`application`** – Controller slot allocation, the hub command
//!   interface, and the per-connection handler.  Knows nothing about sockets
//!   or serial ports beyond the generic byte streams it is handed.
//! - **`infrastructure`** – TCP acceptor, serial link and sync loop, TOML
//!   configuration.

pub mod application;
pub mod infrastructure;
