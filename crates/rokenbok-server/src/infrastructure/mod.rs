//! Infrastructure layer for the hub server.
//!
//! Contains OS-facing adapters: the TCP acceptor, the serial link and its
//! sync loop, and configuration file loading.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rokenbok_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod serial;
pub mod storage;
