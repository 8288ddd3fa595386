//! Huntsync Core Library
//!
//! Status taxonomy, session identity, party/role models, configuration and
//! the host game-state provider interface for the Huntsync session client.

pub mod config;
pub mod error;
pub mod host;
pub mod invariants;
pub mod models;
pub mod session;
pub mod status;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use host::{GameHost, PlayerSnapshot};
pub use models::*;
pub use session::{percent_encode, Endpoint, SessionKey};
pub use status::{Status, StatusTally};
