//! Sync loop
//!
//! Once a session is active, a background task performs one push (leader)
//! or pull (follower) pass per tick. Passes walk monsters 0..3 in order,
//! parts before ailments. The role and session key are re-read before every
//! relay call; a role change or a cancellation ends the pass early without
//! undoing what was already exchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use huntsync_core::{wire_value, GameHost, MonsterSlot, Role, SessionKey};
use huntsync_net::{RelayClient, Response, Transport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::SharedSession;

/// Everything a pass needs, shared with the session worker
pub struct SyncContext<H, T> {
    pub host: Arc<H>,
    pub relay: Arc<RelayClient<T>>,
    pub shared: Arc<SharedSession>,
    pub health_debounce: Duration,
}

impl<H, T> Clone for SyncContext<H, T> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            relay: Arc::clone(&self.relay),
            shared: Arc::clone(&self.shared),
            health_debounce: self.health_debounce,
        }
    }
}

/// Outcome of one push or pull pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Values written to the relay (leader)
    pub pushed: usize,
    /// Values applied to the host (follower)
    pub applied: usize,
    pub failed: usize,
    /// Failures that produced a log line
    pub reported: usize,
    /// Pass ended early on a role change, cancellation or host loss
    pub aborted: bool,
}

/// Which field a relay call touched
#[derive(Debug, Clone, Copy)]
enum Field {
    Part(usize),
    Ailment(usize),
}

impl<H: GameHost, T: Transport> SyncContext<H, T> {
    /// Key to use for the next call, or `None` if the pass must stop
    async fn key_for(&self, role: Role, cancel: &CancellationToken) -> Option<SessionKey> {
        if cancel.is_cancelled() {
            return None;
        }
        let state = self.shared.snapshot().await;
        (state.role == role && state.key.is_addressable()).then_some(state.key)
    }

    /// Push the leader's readings.
    ///
    /// Part health is sent only for monsters whose health changed within the
    /// debounce window ending at `now`; ailment buildup is always sent.
    pub async fn push_pass(&self, cancel: &CancellationToken, now: Instant) -> PassReport {
        let mut report = PassReport::default();

        for monster in MonsterSlot::ALL {
            let recently_hit = self
                .host
                .health_updated_at(monster)
                .is_some_and(|t| now.saturating_duration_since(t) <= self.health_debounce);

            if recently_hit {
                let Some(parts) = self.host.part_count(monster) else {
                    report.aborted = true;
                    return report;
                };
                for part in 0..parts {
                    let Some(key) = self.key_for(Role::Leader, cancel).await else {
                        report.aborted = true;
                        return report;
                    };
                    let value = wire_value(self.host.part_health(monster, part));
                    let response = self.relay.set_part_hp(&key, monster, part, value).await;
                    self.record_push(
                        &mut report,
                        "push part hp",
                        monster,
                        Field::Part(part),
                        &response,
                    );
                }
            }

            let Some(ailments) = self.host.ailment_count(monster) else {
                report.aborted = true;
                return report;
            };
            for ailment in 0..ailments {
                let Some(key) = self.key_for(Role::Leader, cancel).await else {
                    report.aborted = true;
                    return report;
                };
                let value = wire_value(self.host.ailment_buildup(monster, ailment));
                let response = self
                    .relay
                    .set_ailment_buildup(&key, monster, ailment, value)
                    .await;
                self.record_push(
                    &mut report,
                    "push ailment buildup",
                    monster,
                    Field::Ailment(ailment),
                    &response,
                );
            }
        }

        report
    }

    /// Pull the leader's readings into the host
    pub async fn pull_pass(&self, cancel: &CancellationToken) -> PassReport {
        let mut report = PassReport::default();

        for monster in MonsterSlot::ALL {
            let Some(parts) = self.host.part_count(monster) else {
                report.aborted = true;
                return report;
            };
            for part in 0..parts {
                let Some(key) = self.key_for(Role::Follower, cancel).await else {
                    report.aborted = true;
                    return report;
                };
                let response = self.relay.part_hp(&key, monster, part).await;
                let pulled = self.record_pull(
                    &mut report,
                    "pull part hp",
                    monster,
                    Field::Part(part),
                    &response,
                );
                if let Some(value) = pulled {
                    self.host.set_part_health(monster, part, value);
                }
            }

            let Some(ailments) = self.host.ailment_count(monster) else {
                report.aborted = true;
                return report;
            };
            for ailment in 0..ailments {
                let Some(key) = self.key_for(Role::Follower, cancel).await else {
                    report.aborted = true;
                    return report;
                };
                let response = self.relay.ailment_buildup(&key, monster, ailment).await;
                if let Some(value) = self.record_pull(
                    &mut report,
                    "pull ailment buildup",
                    monster,
                    Field::Ailment(ailment),
                    &response,
                ) {
                    self.host.set_ailment_buildup(monster, ailment, value);
                }
            }
        }

        report
    }

    fn record_push(
        &self,
        report: &mut PassReport,
        op: &'static str,
        monster: MonsterSlot,
        field: Field,
        response: &Response,
    ) {
        if response.is_ok() {
            report.pushed += 1;
        } else {
            report.failed += 1;
            if report_failure(&self.relay, op, monster, field, response) {
                report.reported += 1;
            }
        }
    }

    fn record_pull(
        &self,
        report: &mut PassReport,
        op: &'static str,
        monster: MonsterSlot,
        field: Field,
        response: &Response,
    ) -> Option<u32> {
        if !response.is_ok() {
            report.failed += 1;
            if report_failure(&self.relay, op, monster, field, response) {
                report.reported += 1;
            }
            return None;
        }

        match response.int_value() {
            Some(value) => {
                report.applied += 1;
                Some(value)
            }
            None => {
                debug!(op, %monster, ?field, value = %response.value, "Unreadable relay value");
                report.failed += 1;
                None
            }
        }
    }
}

/// Log a failed exchange, but only on the first occurrence of its status
/// since the tally was last reset. Returns whether a line was logged.
fn report_failure<T: Transport>(
    relay: &RelayClient<T>,
    op: &'static str,
    monster: MonsterSlot,
    field: Field,
    response: &Response,
) -> bool {
    if relay.count(response.status) != 1 {
        return false;
    }
    warn!(
        op,
        %monster,
        ?field,
        status = %response.status,
        value = %response.value,
        "Error in {}",
        op
    );
    true
}

/// Handle to a running sync task
pub struct SyncLoop {
    role: Role,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl SyncLoop {
    /// Spawn the loop for `role` with a fixed tick interval
    pub fn start<H: GameHost, T: Transport>(
        ctx: SyncContext<H, T>,
        role: Role,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(ctx, role, interval, cancel.clone()));
        debug!(role = %role, interval_ms = interval.as_millis() as u64, "Started sync loop");
        Self {
            role,
            cancel,
            handle,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop and wait up to `timeout` for it to finish.
    ///
    /// The task is never aborted: an interrupted relay call could leave the
    /// tally half-updated. Returns false if the wait timed out and the task
    /// was left to finish on its own.
    pub async fn stop(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(_) => {
                debug!(role = %self.role, "Stopped sync loop");
                true
            }
            Err(_) => {
                warn!(
                    role = %self.role,
                    timeout_ms = timeout.as_millis() as u64,
                    "Sync loop did not stop in time, detaching"
                );
                false
            }
        }
    }
}

async fn run<H: GameHost, T: Transport>(
    ctx: SyncContext<H, T>,
    role: Role,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticks: u64 = 0;

    while !cancel.is_cancelled() && ctx.host.is_active() {
        let report = match role {
            Role::Leader => ctx.push_pass(&cancel, Instant::now()).await,
            Role::Follower => ctx.pull_pass(&cancel).await,
            Role::NotInSession => break,
        };
        ticks += 1;
        if report.aborted {
            debug!(role = %role, tick = ticks, "Sync pass aborted");
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(role = %role, ticks, "Sync loop finished");
}
