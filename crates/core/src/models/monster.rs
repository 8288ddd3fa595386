//! Tracked monster addressing

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of monsters the host tracks at once
pub const MONSTER_SLOTS: usize = 3;

/// 0-based index of one of the tracked monsters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonsterSlot(u8);

impl MonsterSlot {
    /// Every slot in push/pull order
    pub const ALL: [MonsterSlot; MONSTER_SLOTS] = [MonsterSlot(0), MonsterSlot(1), MonsterSlot(2)];

    pub fn new(index: usize) -> Option<Self> {
        (index < MONSTER_SLOTS).then(|| MonsterSlot(index as u8))
    }

    /// Slot for the host's 1-based monster number
    pub fn from_number(number: usize) -> Option<Self> {
        number.checked_sub(1).and_then(Self::new)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MonsterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convert a host reading into the value sent to the relay.
///
/// Absent, NaN and negative readings all become 0.
pub fn wire_value(reading: Option<f32>) -> u32 {
    match reading {
        Some(v) if v.is_finite() && v > 0.0 => {
            if v >= u32::MAX as f32 {
                u32::MAX
            } else {
                v as u32
            }
        }
        Some(v) if v == f32::INFINITY => u32::MAX,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_number() {
        assert_eq!(MonsterSlot::from_number(1), Some(MonsterSlot(0)));
        assert_eq!(MonsterSlot::from_number(3).map(|s| s.index()), Some(2));
        assert_eq!(MonsterSlot::from_number(0), None);
        assert_eq!(MonsterSlot::from_number(4), None);
    }

    #[test]
    fn test_wire_value_clamps() {
        assert_eq!(wire_value(Some(1520.7)), 1520);
        assert_eq!(wire_value(Some(f32::NAN)), 0);
        assert_eq!(wire_value(Some(-12.0)), 0);
        assert_eq!(wire_value(None), 0);
    }
}
