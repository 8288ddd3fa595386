//! Plugin lifecycle
//!
//! `initialize` gates on the relay, spawns the session worker and queues the
//! first evaluation; `unload` leaves any session and stops the worker.

use std::sync::Arc;
use std::time::Duration;

use huntsync_core::{Error, GameHost, Result, SyncConfig};
use huntsync_net::{HttpTransport, RelayClient, Transport};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::events::HostEvent;
use crate::session::{self, SessionHandle, SessionManager};
use crate::startup::{self, GateReport};

/// A running sync client attached to one host
pub struct SyncPlugin {
    handle: SessionHandle,
    worker: JoinHandle<()>,
    gate: GateReport,
    unload_timeout: Duration,
}

impl SyncPlugin {
    /// Start against the configured relay over HTTP
    pub async fn initialize<H: GameHost>(host: Arc<H>, config: SyncConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout())
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        let relay = Arc::new(RelayClient::new(transport, config.relay_url.clone()));
        Self::initialize_with(host, relay, config).await
    }

    /// Start with an already-built relay client
    pub async fn initialize_with<H: GameHost, T: Transport>(
        host: Arc<H>,
        relay: Arc<RelayClient<T>>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;
        let gate = startup::check_relay(&relay, &config).await?;

        // teardown may wait on the sync loop, then on one relay call
        let unload_timeout = config.stop_timeout() + config.request_timeout();
        let manager = SessionManager::new(host, relay, config);
        let (handle, worker) = session::spawn(manager);
        handle
            .notify(HostEvent::Settled)
            .map_err(|e| Error::Config(e.to_string()))?;

        info!("Sync plugin initialized");
        Ok(Self {
            handle,
            worker,
            gate,
            unload_timeout,
        })
    }

    /// Where the host delivers its events
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn gate(&self) -> &GateReport {
        &self.gate
    }

    /// Leave any session and stop the worker, waiting a bounded time
    pub async fn unload(self) {
        self.handle.shutdown();
        match tokio::time::timeout(self.unload_timeout, self.worker).await {
            Ok(Ok(())) => info!("Sync plugin unloaded"),
            Ok(Err(e)) => warn!(error = %e, "Session worker ended abnormally"),
            Err(_) => warn!("Session worker did not stop in time"),
        }
    }
}
