//! Test doubles shared by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use huntsync_core::{GameHost, MonsterSlot, PartyMember, PlayerSnapshot, MONSTER_SLOTS};
use huntsync_net::InMemoryRelay;

pub const BASE: &str = "http://relay.test";

pub fn relay() -> InMemoryRelay {
    InMemoryRelay::new(BASE)
}

#[derive(Debug, Default, Clone)]
struct FakeMonster {
    parts: Vec<Option<f32>>,
    ailments: Vec<Option<f32>>,
    health_updated_at: Option<Instant>,
}

#[derive(Debug)]
struct HostState {
    active: bool,
    player: Option<PlayerSnapshot>,
    party: Option<Vec<PartyMember>>,
    monsters: Vec<FakeMonster>,
    written_parts: HashMap<(MonsterSlot, usize), u32>,
    written_ailments: HashMap<(MonsterSlot, usize), u32>,
}

/// Scriptable host that records every value written into it
#[derive(Debug)]
pub struct FakeHost {
    state: Mutex<HostState>,
    faulty_reads: AtomicUsize,
}

impl FakeHost {
    /// Active host, player in combat zone 101 with the given session id
    pub fn in_session(session_id: &str) -> Self {
        Self {
            state: Mutex::new(HostState {
                active: true,
                player: Some(PlayerSnapshot {
                    session_id: session_id.to_string(),
                    zone_id: 101,
                    in_peace_zone: false,
                }),
                party: Some(Vec::new()),
                monsters: vec![FakeMonster::default(); MONSTER_SLOTS],
                written_parts: HashMap::new(),
                written_ailments: HashMap::new(),
            }),
            faulty_reads: AtomicUsize::new(0),
        }
    }

    pub fn solo_leader(session_id: &str, name: &str) -> Self {
        let host = Self::in_session(session_id);
        host.set_party(Some(vec![PartyMember::new(name).leader().local()]));
        host
    }

    pub fn follower_of(session_id: &str, name: &str, leader: &str) -> Self {
        let host = Self::in_session(session_id);
        host.set_party(Some(vec![
            PartyMember::new(leader).leader(),
            PartyMember::new(name).local(),
        ]));
        host
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    /// Make the next `reads` player lookups panic
    pub fn fail_next_reads(&self, reads: usize) {
        self.faulty_reads.store(reads, Ordering::SeqCst);
    }

    pub fn set_active(&self, active: bool) {
        self.lock().active = active;
    }

    pub fn set_player(&self, player: Option<PlayerSnapshot>) {
        self.lock().player = player;
    }

    pub fn set_zone(&self, zone_id: u32, in_peace_zone: bool) {
        if let Some(player) = self.lock().player.as_mut() {
            player.zone_id = zone_id;
            player.in_peace_zone = in_peace_zone;
        }
    }

    pub fn set_session_id(&self, session_id: &str) {
        if let Some(player) = self.lock().player.as_mut() {
            player.session_id = session_id.to_string();
        }
    }

    pub fn set_party(&self, party: Option<Vec<PartyMember>>) {
        self.lock().party = party;
    }

    pub fn set_monster(
        &self,
        monster: MonsterSlot,
        parts: Vec<Option<f32>>,
        ailments: Vec<Option<f32>>,
    ) {
        let mut state = self.lock();
        let m = &mut state.monsters[monster.index()];
        m.parts = parts;
        m.ailments = ailments;
    }

    pub fn set_health_updated(&self, monster: MonsterSlot, at: Option<Instant>) {
        self.lock().monsters[monster.index()].health_updated_at = at;
    }

    pub fn written_part(&self, monster: MonsterSlot, part: usize) -> Option<u32> {
        self.lock().written_parts.get(&(monster, part)).copied()
    }

    pub fn written_ailment(&self, monster: MonsterSlot, ailment: usize) -> Option<u32> {
        self.lock().written_ailments.get(&(monster, ailment)).copied()
    }
}

impl GameHost for FakeHost {
    fn is_active(&self) -> bool {
        self.lock().active
    }

    fn player(&self) -> Option<PlayerSnapshot> {
        let faulty = self
            .faulty_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if faulty {
            panic!("host read failed");
        }
        self.lock().player.clone()
    }

    fn party(&self) -> Option<Vec<PartyMember>> {
        self.lock().party.clone()
    }

    fn part_count(&self, monster: MonsterSlot) -> Option<usize> {
        Some(self.lock().monsters[monster.index()].parts.len())
    }

    fn ailment_count(&self, monster: MonsterSlot) -> Option<usize> {
        Some(self.lock().monsters[monster.index()].ailments.len())
    }

    fn part_health(&self, monster: MonsterSlot, part: usize) -> Option<f32> {
        self.lock().monsters[monster.index()].parts.get(part).copied().flatten()
    }

    fn ailment_buildup(&self, monster: MonsterSlot, ailment: usize) -> Option<f32> {
        self.lock().monsters[monster.index()]
            .ailments
            .get(ailment)
            .copied()
            .flatten()
    }

    fn health_updated_at(&self, monster: MonsterSlot) -> Option<Instant> {
        self.lock().monsters[monster.index()].health_updated_at
    }

    fn set_part_health(&self, monster: MonsterSlot, part: usize, value: u32) {
        self.lock().written_parts.insert((monster, part), value);
    }

    fn set_ailment_buildup(&self, monster: MonsterSlot, ailment: usize, value: u32) {
        self.lock().written_ailments.insert((monster, ailment), value);
    }
}
