//! Host events delivered to the session worker

use huntsync_core::MonsterSlot;

/// A trigger from the host game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Initial evaluation once the module is up
    Settled,
    /// The host's online session id changed
    SessionChanged,
    ZoneChanged,
    CharacterLogout,
    MonsterDied(MonsterSlot),
    MonsterDespawned(MonsterSlot),
}

impl HostEvent {
    /// Whether this event re-evaluates the session role
    pub fn triggers_transition(&self) -> bool {
        matches!(
            self,
            HostEvent::Settled | HostEvent::SessionChanged | HostEvent::ZoneChanged
        )
    }
}
