//! Huntsync - live combat state sharing for ad-hoc multiplayer sessions
//!
//! One party member (the leader) pushes monster part health and ailment
//! buildup to a stateless relay; everyone else pulls and applies it.
//!
//! - [`startup`]: relay liveness/version gate run once before anything else
//! - [`session`]: role state machine and the worker that runs transitions
//! - [`sync`]: the cancellable push/pull polling loop
//! - [`plugin`]: initialize/unload lifecycle for a host

pub mod events;
pub mod logging;
pub mod plugin;
pub mod session;
pub mod startup;
pub mod sync;

#[cfg(test)]
mod testing;

pub use events::HostEvent;
pub use plugin::SyncPlugin;
pub use session::{SessionHandle, SessionManager, SessionSummary, SharedSession};
pub use startup::{check_relay, GateReport};
pub use sync::{PassReport, SyncContext, SyncLoop};
