//! Application layer: slot allocation, the hub command interface, and the
//! per-connection handler.

pub mod controller_pool;
pub mod handle_connection;
pub mod hub_commands;
