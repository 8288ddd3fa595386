//! Huntsync Network Library
//!
//! HTTP access to the session relay.
//!
//! # Architecture
//!
//! - **Transport**: issues one GET and returns the raw answer (reqwest, or in-memory)
//! - **Client**: builds session routes, decodes `{status, value}` answers and
//!   keeps the per-session status tally
//! - **Protocol**: relay response types
//!
//! # Usage
//!
//! ```ignore
//! let transport = HttpTransport::new(Duration::from_secs(5))?;
//! let relay = RelayClient::new(transport, "http://localhost:8080");
//!
//! let mut key = SessionKey::new(relay.base_url());
//! key.set_session_id("Qw3rTy");
//! key.set_party_leader("Aiko");
//! if relay.create_session(&key).await.is_ok() {
//!     relay.set_part_hp(&key, MonsterSlot::ALL[0], 0, 1200).await;
//! }
//! ```

pub mod client;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod transport;

pub use client::RelayClient;
pub use error::{Result, TransportError};
pub use memory::InMemoryRelay;
pub use protocol::{RawResponse, Response};
pub use transport::{HttpTransport, Transport};
