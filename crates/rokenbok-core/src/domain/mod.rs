//! Domain entities for the Rokenbok hub.
//!
//! Pure state and rules with no I/O: who a player is, which vehicle they
//! want, and which buttons they are holding.  The server shares one
//! [`hub_state::HubState`] between every connection handler and the serial
//! sync loop.

/// Player and vehicle identifiers.
pub mod player;

/// The shared button/selection store and its serial frame layout.
pub mod hub_state;
