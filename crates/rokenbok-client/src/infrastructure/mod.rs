//! Infrastructure layer for the client: the TCP session with the server.

pub mod network;
