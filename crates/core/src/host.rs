//! Host game-state provider
//!
//! The host owns the monsters, the party and the player. This crate only
//! reads and writes individual field values through [`GameHost`]. Every
//! read is fallible: `None` means the host context is (possibly briefly)
//! unavailable, e.g. while the game process is closing.

use std::time::Instant;

use crate::models::{MonsterSlot, PartyMember};

/// Snapshot of the local player's location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    /// Host session identifier, empty when not in an online session
    pub session_id: String,
    pub zone_id: u32,
    pub in_peace_zone: bool,
}

/// Read/write access to the host's live combat state
pub trait GameHost: Send + Sync + 'static {
    /// Whether the host context is still alive
    fn is_active(&self) -> bool;

    fn player(&self) -> Option<PlayerSnapshot>;

    fn party(&self) -> Option<Vec<PartyMember>>;

    fn part_count(&self, monster: MonsterSlot) -> Option<usize>;

    fn ailment_count(&self, monster: MonsterSlot) -> Option<usize>;

    /// Current part health; `None` when there is no usable reading
    fn part_health(&self, monster: MonsterSlot, part: usize) -> Option<f32>;

    /// Current ailment buildup; `None` when there is no usable reading
    fn ailment_buildup(&self, monster: MonsterSlot, ailment: usize) -> Option<f32>;

    /// When the monster's health last changed, if ever
    fn health_updated_at(&self, monster: MonsterSlot) -> Option<Instant>;

    fn set_part_health(&self, monster: MonsterSlot, part: usize, value: u32);

    fn set_ailment_buildup(&self, monster: MonsterSlot, ailment: usize, value: u32);
}
