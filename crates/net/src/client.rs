//! Relay client
//!
//! Turns a logical relay operation into a GET against the session URL and
//! folds every outcome into a [`Response`]. Nothing escapes as an error:
//! transport and decode failures become [`Status::Exception`]. Each answer
//! is counted in the session tally, except existence probes and
//! `sessionDoesNotExist`, which are expected outcomes.

use std::sync::{Mutex, MutexGuard};

use huntsync_core::{Endpoint, MonsterSlot, SessionKey, Status, StatusTally};
use tracing::{debug, error};

use crate::protocol::{RawResponse, Response};
use crate::transport::Transport;

/// Route suffix of the existence probe
const EXISTS_SUFFIX: &str = "/exists";

/// Relay client handle
pub struct RelayClient<T> {
    transport: T,
    base_url: String,
    tally: Mutex<StatusTally>,
}

impl<T: Transport> RelayClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tally: Mutex::new(StatusTally::new()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform one GET and classify the outcome
    pub async fn call(&self, url: &str) -> Response {
        let response = match self.transport.get(url).await {
            Ok(raw) => decode(url, raw),
            Err(e) => {
                error!(url = %url, error = %e, "Relay request failed");
                Response::exception(format!("Request to {} failed: {}", url, e))
            }
        };

        if counts_toward_tally(url, response.status) {
            self.lock_tally().increment(response.status);
        }
        response
    }

    /// Snapshot of the current tally
    pub fn tally(&self) -> StatusTally {
        self.lock_tally().clone()
    }

    pub fn count(&self, status: Status) -> u32 {
        self.lock_tally().count(status)
    }

    /// Return the tally and reset it to zero
    pub fn take_tally(&self) -> StatusTally {
        std::mem::take(&mut *self.lock_tally())
    }

    /// Liveness probe against the relay root
    pub async fn is_alive(&self) -> bool {
        self.call(&format!("{}/", self.base_url)).await.is_ok()
    }

    pub async fn version(&self) -> Response {
        self.call(&format!("{}/version", self.base_url)).await
    }

    pub async fn create_session(&self, key: &SessionKey) -> Response {
        self.call(&key.url_for(Endpoint::Create)).await
    }

    /// Whether the session addressed by `key` exists on the relay.
    ///
    /// Returns false without any request when the key is not addressable.
    pub async fn session_exists(&self, key: &SessionKey) -> bool {
        if self.base_url.is_empty() || !key.is_addressable() {
            debug!("Skipping existence probe for incomplete session key");
            return false;
        }
        self.call(&key.url_for(Endpoint::Exists)).await.is_ok()
    }

    pub async fn delete_session(&self, key: &SessionKey) -> Response {
        self.call(&key.url_for(Endpoint::Delete)).await
    }

    pub async fn clear_monster(&self, key: &SessionKey, monster: MonsterSlot) -> Response {
        self.call(&key.url_for(Endpoint::ClearMonster(monster))).await
    }

    pub async fn part_hp(&self, key: &SessionKey, monster: MonsterSlot, part: usize) -> Response {
        self.call(&key.url_for(Endpoint::PartHp {
            monster,
            part,
            value: None,
        }))
        .await
    }

    pub async fn set_part_hp(
        &self,
        key: &SessionKey,
        monster: MonsterSlot,
        part: usize,
        value: u32,
    ) -> Response {
        self.call(&key.url_for(Endpoint::PartHp {
            monster,
            part,
            value: Some(value),
        }))
        .await
    }

    pub async fn ailment_buildup(
        &self,
        key: &SessionKey,
        monster: MonsterSlot,
        ailment: usize,
    ) -> Response {
        self.call(&key.url_for(Endpoint::AilmentBuildup {
            monster,
            ailment,
            value: None,
        }))
        .await
    }

    pub async fn set_ailment_buildup(
        &self,
        key: &SessionKey,
        monster: MonsterSlot,
        ailment: usize,
        value: u32,
    ) -> Response {
        self.call(&key.url_for(Endpoint::AilmentBuildup {
            monster,
            ailment,
            value: Some(value),
        }))
        .await
    }

    fn lock_tally(&self) -> MutexGuard<'_, StatusTally> {
        match self.tally.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Status tally mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn decode(url: &str, raw: RawResponse) -> Response {
    match Response::from_bytes(raw.body.as_bytes()) {
        Ok(response) => response,
        Err(_) if raw.http_status == 404 => {
            Response::new(Status::E404, format!("{} not found", url))
        }
        Err(e) => {
            error!(
                url = %url,
                http_status = raw.http_status,
                error = %e,
                "Undecodable relay response"
            );
            Response::exception(format!(
                "Invalid response from {} (HTTP {}): {}",
                url, raw.http_status, e
            ))
        }
    }
}

fn is_existence_probe(url: &str) -> bool {
    url.trim_end_matches('/').ends_with(EXISTS_SUFFIX)
}

fn counts_toward_tally(url: &str, status: Status) -> bool {
    !is_existence_probe(url) && status != Status::SessionDoesNotExist
}
