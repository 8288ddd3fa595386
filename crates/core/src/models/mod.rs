//! Data models for Huntsync

mod monster;
mod party;

pub use monster::*;
pub use party::*;
