//! Startup gate
//!
//! Runs once before any session logic: the relay must answer its root
//! route within the retry budget, and, when a protocol version is
//! configured, report exactly that version.

use huntsync_core::{Error, Result, SyncConfig};
use huntsync_net::{RelayClient, Transport};
use tracing::{info, warn};

/// What the gate learned about the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    /// Attempts used until the relay answered
    pub attempts: u32,
    /// Version reported by the relay, when it was checked
    pub version: Option<u32>,
}

/// Bounded-retry liveness and compatibility check
pub async fn check_relay<T: Transport>(
    relay: &RelayClient<T>,
    config: &SyncConfig,
) -> Result<GateReport> {
    let budget = config.startup_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        if relay.is_alive().await {
            break;
        }
        if attempts >= budget {
            warn!(attempts, "Could not reach relay, stopping module initialization");
            relay.take_tally();
            return Err(Error::RelayUnreachable { attempts });
        }
        warn!(
            relay = %relay.base_url(),
            remaining = budget - attempts,
            "Could not reach relay, retrying"
        );
        tokio::time::sleep(config.startup_retry_delay()).await;
    }

    let version = match config.expected_protocol_version {
        Some(expected) => Some(check_version(relay, expected).await?),
        None => None,
    };

    // startup probes are not part of any session
    relay.take_tally();
    info!(relay = %relay.base_url(), attempts, ?version, "Relay reachable");
    Ok(GateReport { attempts, version })
}

async fn check_version<T: Transport>(relay: &RelayClient<T>, expected: u32) -> Result<u32> {
    let response = relay.version().await;
    if !response.is_ok() {
        relay.take_tally();
        return Err(Error::VersionUnavailable(format!(
            "{}: {}",
            response.status, response.value
        )));
    }

    match response.value.trim().parse::<u32>() {
        Ok(found) if found == expected => Ok(found),
        _ => {
            relay.take_tally();
            warn!(expected, found = %response.value, "Relay protocol version mismatch");
            Err(Error::VersionMismatch {
                expected,
                found: response.value,
            })
        }
    }
}
