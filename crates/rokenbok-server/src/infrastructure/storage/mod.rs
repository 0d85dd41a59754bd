//! Storage infrastructure: the TOML configuration file.

pub mod config;
