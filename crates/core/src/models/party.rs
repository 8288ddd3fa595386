//! Party membership and sync roles

use serde::{Deserialize, Serialize};

/// Sync role of the local participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// No active session
    #[default]
    NotInSession,
    /// Pushes local readings to the relay
    Leader,
    /// Pulls readings from the relay and applies them locally
    Follower,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::NotInSession => "Not in session",
            Role::Leader => "Leader",
            Role::Follower => "Follower",
        }
    }

    /// Leader or Follower
    pub fn in_session(&self) -> bool {
        !matches!(self, Role::NotInSession)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One entry of the host's party snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMember {
    pub name: String,
    pub is_leader: bool,
    pub is_local_player: bool,
    pub in_party: bool,
}

impl PartyMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_leader: false,
            is_local_player: false,
            in_party: true,
        }
    }

    pub fn leader(mut self) -> Self {
        self.is_leader = true;
        self
    }

    pub fn local(mut self) -> Self {
        self.is_local_player = true;
        self
    }
}

/// What the party snapshot says about the local participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyStanding {
    /// Local participant leads the party
    Leading { name: String },
    /// Someone else leads; join their session
    Following { leader: String },
    /// Not a recognized party member, or no leader is known
    Outside,
}

impl PartyStanding {
    /// Derive the standing from a membership snapshot.
    ///
    /// Leadership requires the local entry to be both the leader and a
    /// recognized party member. Followers need a known leader name.
    pub fn resolve(members: &[PartyMember]) -> Self {
        let Some(me) = members.iter().find(|m| m.is_local_player && m.in_party) else {
            return PartyStanding::Outside;
        };

        if me.is_leader {
            return PartyStanding::Leading {
                name: me.name.clone(),
            };
        }

        match members.iter().find(|m| m.is_leader) {
            Some(leader) if !leader.name.is_empty() => PartyStanding::Following {
                leader: leader.name.clone(),
            },
            _ => PartyStanding::Outside,
        }
    }
}
