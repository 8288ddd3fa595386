//! Role/session state machine
//!
//! Decides from the host's party snapshot whether the local participant
//! leads, follows, or stays out of a relay session, and drives session
//! creation, verification and teardown. All transitions run on a single
//! worker task fed by a command channel, so a teardown-then-setup sequence
//! never interleaves with another one and host event delivery never waits
//! on relay I/O.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use huntsync_core::invariants::{assert_session_invariants, assert_tally_flushed};
use huntsync_core::{GameHost, MonsterSlot, PartyStanding, Role, SessionKey, Status, SyncConfig};
use huntsync_net::{RelayClient, Transport};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::HostEvent;
use crate::sync::{SyncContext, SyncLoop};

/// Role and key as seen by both the worker and the sync loop
#[derive(Debug, Clone)]
pub struct SessionState {
    pub role: Role,
    pub key: SessionKey,
}

/// Session state shared across tasks
#[derive(Debug)]
pub struct SharedSession {
    state: RwLock<SessionState>,
    role_tx: watch::Sender<Role>,
}

impl SharedSession {
    pub fn new(base_url: &str) -> Self {
        let (role_tx, _) = watch::channel(Role::NotInSession);
        Self {
            state: RwLock::new(SessionState {
                role: Role::NotInSession,
                key: SessionKey::new(base_url),
            }),
            role_tx,
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn role(&self) -> Role {
        self.state.read().await.role
    }

    /// Observe role changes
    pub fn subscribe(&self) -> watch::Receiver<Role> {
        self.role_tx.subscribe()
    }

    pub(crate) async fn enter(&self, role: Role, key: SessionKey) {
        {
            let mut s = self.state.write().await;
            s.role = role;
            s.key = key;
            assert_session_invariants(s.role, &s.key);
        }
        self.role_tx.send_replace(role);
    }

    /// Key for the session being evaluated, before any role is taken
    async fn stage_key(&self, key: SessionKey) {
        let mut s = self.state.write().await;
        s.key = key;
    }

    pub(crate) async fn leave(&self) {
        {
            let mut s = self.state.write().await;
            s.role = Role::NotInSession;
            s.key.clear();
            assert_session_invariants(s.role, &s.key);
        }
        self.role_tx.send_replace(Role::NotInSession);
    }
}

/// Result of tearing a session down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub role: Role,
    pub errors: u32,
    pub report: String,
}

/// The state machine. Owned by the worker task.
pub struct SessionManager<H, T> {
    host: Arc<H>,
    relay: Arc<RelayClient<T>>,
    config: SyncConfig,
    shared: Arc<SharedSession>,
    sync: Option<SyncLoop>,
    poll_interval: Duration,
    started_at: Option<DateTime<Utc>>,
}

impl<H: GameHost, T: Transport> SessionManager<H, T> {
    pub fn new(host: Arc<H>, relay: Arc<RelayClient<T>>, config: SyncConfig) -> Self {
        let shared = Arc::new(SharedSession::new(relay.base_url()));
        let poll_interval = config.poll_interval();
        Self {
            host,
            relay,
            config,
            shared,
            sync: None,
            poll_interval,
            started_at: None,
        }
    }

    pub fn shared(&self) -> Arc<SharedSession> {
        Arc::clone(&self.shared)
    }

    pub async fn role(&self) -> Role {
        self.shared.role().await
    }

    pub fn sync_running(&self) -> bool {
        self.sync.as_ref().is_some_and(SyncLoop::is_running)
    }

    /// Takes effect the next time the sync loop starts
    pub fn set_poll_interval(&mut self, interval: Duration) {
        info!(interval_ms = interval.as_millis() as u64, "Poll interval updated");
        self.poll_interval = interval;
    }

    pub async fn handle(&mut self, event: HostEvent) {
        debug!(?event, "Host event");
        if event.triggers_transition() {
            self.transition().await;
            return;
        }
        match event {
            HostEvent::CharacterLogout => {
                self.teardown().await;
            }
            HostEvent::MonsterDied(monster) | HostEvent::MonsterDespawned(monster) => {
                self.clear_monster(monster).await;
            }
            HostEvent::Settled | HostEvent::SessionChanged | HostEvent::ZoneChanged => {}
        }
    }

    /// Leave the current session (if any), then work out the new role
    pub async fn transition(&mut self) -> Role {
        self.teardown().await;

        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let role = match self.evaluate().await {
            Some(role) => role,
            None => {
                debug!("Host context unavailable, transition abandoned");
                Role::NotInSession
            }
        };
        if !role.in_session() {
            self.discard_tally();
        }
        role
    }

    /// Drop counts left by a transition that never entered a session
    fn discard_tally(&self) {
        let tally = self.relay.take_tally();
        let errors = tally.error_count();
        if errors > 0 {
            warn!(errors, "{} errors occurred outside any session", errors);
            warn!("{}", tally.to_string().trim_end());
        }
    }

    /// `None` when the host context vanished mid-sequence
    async fn evaluate(&mut self) -> Option<Role> {
        let player = self.host.player()?;

        let mut key = SessionKey::new(self.relay.base_url());
        key.set_session_id(&player.session_id);
        self.shared.stage_key(key.clone()).await;

        if player.in_peace_zone
            || self.config.is_non_combat_zone(player.zone_id)
            || player.session_id.is_empty()
        {
            debug!(
                zone = player.zone_id,
                peace = player.in_peace_zone,
                "No session outside combat zones"
            );
            return Some(Role::NotInSession);
        }

        let members = self.host.party()?;
        match PartyStanding::resolve(&members) {
            PartyStanding::Leading { name } => {
                key.set_party_leader(&name);
                if !self.create_session_if_not_exist(&key).await {
                    return Some(Role::NotInSession);
                }
                self.enter(Role::Leader, key).await;
                Some(Role::Leader)
            }
            PartyStanding::Following { leader } => {
                key.set_party_leader(&leader);
                if !self.relay.session_exists(&key).await {
                    debug!(leader = %leader, "There is no session to enter");
                    return Some(Role::NotInSession);
                }
                info!(leader = %leader, "Entered {}'s session", leader);
                self.enter(Role::Follower, key).await;
                Some(Role::Follower)
            }
            PartyStanding::Outside => {
                debug!("Not a recognized party member");
                Some(Role::NotInSession)
            }
        }
    }

    async fn create_session_if_not_exist(&self, key: &SessionKey) -> bool {
        let response = self.relay.create_session(key).await;
        match response.status {
            Status::Ok => {
                debug!("Created session");
                true
            }
            Status::SessionAlreadyExists => {
                debug!("Did not create session because it already exists");
                true
            }
            status => {
                error!(%status, value = %response.value, "Error creating session");
                false
            }
        }
    }

    async fn enter(&mut self, role: Role, key: SessionKey) {
        self.shared.enter(role, key).await;
        self.started_at = Some(Utc::now());
        self.start_sync(role);
    }

    fn start_sync(&mut self, role: Role) {
        if let Some(existing) = &self.sync {
            if existing.is_running() {
                error!(
                    running = %existing.role(),
                    requested = %role,
                    "Error starting sync loop: it is already active"
                );
                return;
            }
        }

        let ctx = SyncContext {
            host: Arc::clone(&self.host),
            relay: Arc::clone(&self.relay),
            shared: Arc::clone(&self.shared),
            health_debounce: self.config.health_debounce(),
        };
        self.sync = Some(SyncLoop::start(ctx, role, self.poll_interval));
    }

    async fn stop_sync(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.stop(self.config.stop_timeout()).await;
        }
    }

    /// Leave the active session. A no-op when not in a session.
    pub async fn teardown(&mut self) -> Option<SessionSummary> {
        let state = self.shared.snapshot().await;
        if !state.role.in_session() {
            return None;
        }

        self.stop_sync().await;

        if state.role == Role::Leader {
            let response = self.relay.delete_session(&state.key).await;
            if !response.is_ok() {
                warn!(status = %response.status, value = %response.value, "Error deleting session");
            }
        }

        let summary = self.flush_tally(state.role);
        match state.role {
            Role::Leader => debug!("Deleted session"),
            _ => info!("Left session"),
        }

        self.shared.leave().await;
        self.started_at = None;
        Some(summary)
    }

    fn flush_tally(&self, role: Role) -> SessionSummary {
        let tally = self.relay.take_tally();
        let errors = tally.error_count();
        let duration_secs = self
            .started_at
            .map(|t| (Utc::now() - t).num_seconds())
            .unwrap_or_default();

        if errors > 0 {
            error!(errors, duration_secs, "{} errors occurred in this session", errors);
            error!("{}", tally.to_string().trim_end());
        } else {
            debug!(duration_secs, "No errors occurred in this session");
        }
        assert_tally_flushed(&self.relay.tally());

        SessionSummary {
            role,
            errors,
            report: tally.to_string(),
        }
    }

    async fn clear_monster(&self, monster: MonsterSlot) {
        let state = self.shared.snapshot().await;
        if state.role != Role::Leader {
            return;
        }
        let response = self.relay.clear_monster(&state.key, monster).await;
        if !response.is_ok() && self.relay.count(response.status) == 1 {
            warn!(
                %monster,
                status = %response.status,
                value = %response.value,
                "Error clearing monster"
            );
        }
    }

    /// Leave any session and stop syncing for good
    pub async fn shutdown(&mut self) {
        self.teardown().await;
        self.stop_sync().await;
        info!("Session worker stopped");
    }
}

/// Commands accepted by the session worker
#[derive(Debug)]
enum Command {
    Event(HostEvent),
    Reconfigure { poll_interval: Duration },
    Shutdown,
}

/// Cheap handle for delivering host events to the worker
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<SharedSession>,
}

impl SessionHandle {
    /// Queue a host event. Never blocks.
    pub fn notify(&self, event: HostEvent) -> Result<(), &'static str> {
        self.cmd_tx
            .send(Command::Event(event))
            .map_err(|_| "Session worker not running")
    }

    pub fn reconfigure(&self, poll_interval: Duration) -> Result<(), &'static str> {
        self.cmd_tx
            .send(Command::Reconfigure { poll_interval })
            .map_err(|_| "Session worker not running")
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    pub async fn role(&self) -> Role {
        self.shared.role().await
    }

    pub fn subscribe(&self) -> watch::Receiver<Role> {
        self.shared.subscribe()
    }
}

/// Spawn the worker that owns `manager`
pub fn spawn<H: GameHost, T: Transport>(
    manager: SessionManager<H, T>,
) -> (SessionHandle, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        cmd_tx,
        shared: manager.shared(),
    };
    let worker = tokio::spawn(session_task(manager, cmd_rx));
    (handle, worker)
}

async fn session_task<H: GameHost, T: Transport>(
    mut manager: SessionManager<H, T>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        match cmd_rx.recv().await {
            Some(Command::Event(event)) => {
                let handled = AssertUnwindSafe(manager.handle(event)).catch_unwind().await;
                if handled.is_err() {
                    error!(?event, "Host fault while handling event, transition abandoned");
                }
            }
            Some(Command::Reconfigure { poll_interval }) => {
                manager.set_poll_interval(poll_interval)
            }
            Some(Command::Shutdown) | None => {
                manager.shutdown().await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::testing::{relay, FakeHost, BASE};
    use huntsync_core::PartyMember;
    use huntsync_net::InMemoryRelay;
    use tokio_util::sync::CancellationToken;

    fn config() -> SyncConfig {
        SyncConfig {
            relay_url: BASE.to_string(),
            settle_delay_ms: 0,
            poll_interval_ms: 10,
            stop_timeout_ms: 500,
            ..SyncConfig::default()
        }
    }

    fn manager(host: FakeHost, server: InMemoryRelay) -> SessionManager<FakeHost, InMemoryRelay> {
        SessionManager::new(
            Arc::new(host),
            Arc::new(RelayClient::new(server, BASE)),
            config(),
        )
    }

    fn requests(m: &SessionManager<FakeHost, InMemoryRelay>) -> Vec<String> {
        m.relay.transport().requests()
    }

    fn ailment_pushes(relay: &RelayClient<InMemoryRelay>, key: &str) -> usize {
        let prefix = format!("/session/{}/monster/0/ailment/", key);
        relay
            .transport()
            .requests()
            .iter()
            .filter(|p| p.starts_with(&prefix))
            .count()
    }

    #[tokio::test]
    async fn test_solo_leader_creates_session() {
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());

        assert_eq!(m.transition().await, Role::Leader);
        assert_eq!(m.role().await, Role::Leader);
        assert!(m.sync_running());
        assert_eq!(
            requests(&m).iter().filter(|p| p.ends_with("/create")).count(),
            1
        );
        assert!(m.relay.transport().has_session("S1Aiko"));
        m.shutdown().await;
    }

    #[tokio::test]
    async fn test_existing_session_still_leads() {
        let server = relay();
        server.open_session("S1Aiko");
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), server);

        assert_eq!(m.transition().await, Role::Leader);
        assert!(m.sync_running());
        assert_eq!(m.relay.count(Status::SessionAlreadyExists), 1);
        m.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_failure_stays_out() {
        let server = relay();
        server.set_offline(true);
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), server);

        assert_eq!(m.transition().await, Role::NotInSession);
        assert!(!m.sync_running());
    }

    #[tokio::test]
    async fn test_follower_joins_existing_session() {
        let server = relay();
        server.open_session("S1Aiko");
        let mut m = manager(FakeHost::follower_of("S1", "Bram", "Aiko"), server);

        assert_eq!(m.transition().await, Role::Follower);
        let state = m.shared.snapshot().await;
        assert_eq!(state.key.session_url(), "http://relay.test/session/S1Aiko");
        assert!(m.sync_running());
        m.shutdown().await;
    }

    #[tokio::test]
    async fn test_follower_without_session_is_quiet() {
        let mut m = manager(FakeHost::follower_of("S1", "Bram", "Aiko"), relay());

        assert_eq!(m.transition().await, Role::NotInSession);
        assert!(!m.sync_running());
        assert!(m.relay.tally().is_empty());
    }

    #[tokio::test]
    async fn test_no_session_in_non_combat_zones() {
        let host = FakeHost::solo_leader("S1", "Aiko");
        host.set_zone(504, false);
        let mut m = manager(host, relay());
        assert_eq!(m.transition().await, Role::NotInSession);

        m.host.set_zone(101, true);
        assert_eq!(m.transition().await, Role::NotInSession);

        m.host.set_zone(101, false);
        m.host.set_session_id("");
        assert_eq!(m.transition().await, Role::NotInSession);

        assert!(requests(&m).is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_host_aborts_silently() {
        let host = FakeHost::solo_leader("S1", "Aiko");
        host.set_party(None);
        let mut m = manager(host, relay());

        assert_eq!(m.transition().await, Role::NotInSession);
        assert!(requests(&m).is_empty());

        m.host.set_player(None);
        assert_eq!(m.transition().await, Role::NotInSession);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        m.transition().await;

        let summary = m.teardown().await.unwrap();
        assert_eq!(summary.role, Role::Leader);
        assert!(m.teardown().await.is_none());

        assert_eq!(
            requests(&m).iter().filter(|p| p.ends_with("/delete")).count(),
            1
        );
        let state = m.shared.snapshot().await;
        assert_eq!(state.role, Role::NotInSession);
        assert!(!state.key.is_addressable());
        assert!(!m.relay.transport().has_session("S1Aiko"));
    }

    #[tokio::test]
    async fn test_follower_teardown_does_not_delete() {
        let server = relay();
        server.open_session("S1Aiko");
        let mut m = manager(FakeHost::follower_of("S1", "Bram", "Aiko"), server);
        m.transition().await;

        m.teardown().await;
        assert!(m.relay.transport().has_session("S1Aiko"));
        assert!(!requests(&m).iter().any(|p| p.ends_with("/delete")));
    }

    #[tokio::test]
    async fn test_teardown_flushes_tally() {
        let server = relay().with_monster_capacity(1);
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), server);
        m.transition().await;

        m.clear_monster(MonsterSlot::new(2).unwrap()).await;
        let summary = m.teardown().await.unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.report, "ok - 2\nmonsterOutsideRange - 1\n");
        assert!(m.relay.tally().is_empty());
    }

    #[tokio::test]
    async fn test_session_change_moves_to_new_session() {
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        m.transition().await;

        m.host.set_session_id("S2");
        m.handle(HostEvent::SessionChanged).await;

        assert_eq!(m.role().await, Role::Leader);
        assert!(!m.relay.transport().has_session("S1Aiko"));
        assert!(m.relay.transport().has_session("S2Aiko"));
        m.shutdown().await;
    }

    #[tokio::test]
    async fn test_leadership_change_flips_role() {
        let server = relay();
        server.open_session("S1Cato");
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), server);
        m.transition().await;

        m.host.set_party(Some(vec![
            PartyMember::new("Cato").leader(),
            PartyMember::new("Aiko").local(),
        ]));
        m.handle(HostEvent::ZoneChanged).await;

        assert_eq!(m.role().await, Role::Follower);
        assert!(!m.relay.transport().has_session("S1Aiko"));
        m.shutdown().await;
    }

    #[tokio::test]
    async fn test_monster_clear_only_for_leader() {
        let server = relay();
        server.open_session("S1Aiko");
        let mut m = manager(FakeHost::follower_of("S1", "Bram", "Aiko"), server);
        m.transition().await;
        m.handle(HostEvent::MonsterDied(MonsterSlot::new(0).unwrap())).await;
        assert!(!requests(&m).iter().any(|p| p.ends_with("/clear")));
        m.shutdown().await;

        let mut leader = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        leader.transition().await;
        leader
            .handle(HostEvent::MonsterDespawned(MonsterSlot::new(1).unwrap()))
            .await;
        assert!(requests(&leader)
            .iter()
            .any(|p| p == "/session/S1Aiko/monster/1/clear"));
        leader.shutdown().await;
    }

    #[tokio::test]
    async fn test_logout_leaves_without_rejoining() {
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        m.transition().await;

        m.handle(HostEvent::CharacterLogout).await;
        assert_eq!(m.role().await, Role::NotInSession);
        assert!(!m.sync_running());
        assert_eq!(
            requests(&m).iter().filter(|p| p.ends_with("/create")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_second_sync_loop_is_rejected() {
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        m.transition().await;
        assert!(m.sync_running());

        m.start_sync(Role::Leader);
        assert!(m.sync_running());
        m.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_processes_events_in_order() {
        let m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        let relay_client = Arc::clone(&m.relay);
        let (handle, worker) = spawn(m);
        let mut roles = handle.subscribe();

        handle.notify(HostEvent::Settled).unwrap();
        roles.wait_for(|r| *r == Role::Leader).await.unwrap();

        handle.notify(HostEvent::CharacterLogout).unwrap();
        roles.wait_for(|r| *r == Role::NotInSession).await.unwrap();

        handle.shutdown();
        worker.await.unwrap();
        assert!(!relay_client.transport().has_session("S1Aiko"));
        assert!(handle.notify(HostEvent::Settled).is_err());
    }

    #[tokio::test]
    async fn test_failed_create_does_not_leak_into_next_session() {
        let mut m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        m.relay.transport().set_offline(true);
        assert_eq!(m.transition().await, Role::NotInSession);
        assert!(m.relay.tally().is_empty());

        m.relay.transport().set_offline(false);
        assert_eq!(m.transition().await, Role::Leader);
        m.stop_sync().await;

        m.host
            .set_monster(MonsterSlot::new(0).unwrap(), Vec::new(), vec![Some(12.0)]);
        let ctx = SyncContext {
            host: Arc::clone(&m.host),
            relay: Arc::clone(&m.relay),
            shared: m.shared(),
            health_debounce: m.config.health_debounce(),
        };
        m.relay.transport().set_offline(true);
        let report = ctx.push_pass(&CancellationToken::new(), Instant::now()).await;
        m.relay.transport().set_offline(false);

        // first exception of this session is still reported
        assert_eq!(report.failed, 1);
        assert_eq!(report.reported, 1);

        let summary = m.teardown().await.unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.report, "ok - 2\nexception - 1\n");
    }

    #[tokio::test]
    async fn test_reconfigure_applies_from_next_loop() {
        let m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        let host = Arc::clone(&m.host);
        host.set_monster(MonsterSlot::new(0).unwrap(), Vec::new(), vec![Some(5.0)]);
        let relay_client = Arc::clone(&m.relay);
        let (handle, worker) = spawn(m);
        let mut roles = handle.subscribe();

        handle.notify(HostEvent::Settled).unwrap();
        roles.wait_for(|r| *r == Role::Leader).await.unwrap();
        handle.reconfigure(Duration::from_secs(60)).unwrap();

        // the running loop keeps ticking at 10ms
        let before = ailment_pushes(&relay_client, "S1Aiko");
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(ailment_pushes(&relay_client, "S1Aiko") - before >= 3);

        host.set_session_id("S2");
        handle.notify(HostEvent::SessionChanged).unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !relay_client.transport().has_session("S2Aiko") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        // the new loop runs its first pass, then waits out the new interval
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ailment_pushes(&relay_client, "S2Aiko"), 1);

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_survives_host_panic() {
        let m = manager(FakeHost::solo_leader("S1", "Aiko"), relay());
        let host = Arc::clone(&m.host);
        let (handle, worker) = spawn(m);
        let mut roles = handle.subscribe();

        host.fail_next_reads(1);
        handle.notify(HostEvent::Settled).unwrap();
        handle.notify(HostEvent::Settled).unwrap();
        roles.wait_for(|r| *r == Role::Leader).await.unwrap();

        assert!(handle.notify(HostEvent::CharacterLogout).is_ok());
        handle.shutdown();
        worker.await.unwrap();
    }
}
