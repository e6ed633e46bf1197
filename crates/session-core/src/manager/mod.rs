//! Session event system.

pub mod events;
