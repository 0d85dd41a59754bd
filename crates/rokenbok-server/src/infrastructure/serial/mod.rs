//! Serial infrastructure: opening the link to the hub's microcontroller and
//! streaming the control state to it.

pub mod link;
pub mod sync_loop;
