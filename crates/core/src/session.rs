//! Session identity
//!
//! A session on the relay is addressed by the host's session id followed by
//! the party leader's name, both percent-encoded:
//! `<relay>/session/<id><leader>`. The URL is recomputed whenever either
//! part changes.

use url::form_urlencoded;

use crate::models::MonsterSlot;

/// A session-scoped relay route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Create,
    Exists,
    Delete,
    ClearMonster(MonsterSlot),
    /// Read (`value: None`) or write a part's health
    PartHp {
        monster: MonsterSlot,
        part: usize,
        value: Option<u32>,
    },
    /// Read (`value: None`) or write an ailment's buildup
    AilmentBuildup {
        monster: MonsterSlot,
        ailment: usize,
        value: Option<u32>,
    },
}

impl Endpoint {
    fn path(&self) -> String {
        match self {
            Endpoint::Create => "/create".to_string(),
            Endpoint::Exists => "/exists".to_string(),
            Endpoint::Delete => "/delete".to_string(),
            Endpoint::ClearMonster(monster) => format!("/monster/{}/clear", monster),
            Endpoint::PartHp {
                monster,
                part,
                value,
            } => with_value(format!("/monster/{}/part/{}/current_hp", monster, part), *value),
            Endpoint::AilmentBuildup {
                monster,
                ailment,
                value,
            } => with_value(
                format!("/monster/{}/ailment/{}/current_buildup", monster, ailment),
                *value,
            ),
        }
    }
}

fn with_value(path: String, value: Option<u32>) -> String {
    match value {
        Some(v) => format!("{}/{}", path, v),
        None => path,
    }
}

/// Percent-encode one URL component (form encoding, spaces become `+`)
pub fn percent_encode(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// Addressable key of the current relay session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionKey {
    base_url: String,
    session_id: String,
    party_leader: String,
    url: String,
}

impl SessionKey {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Encoded session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Encoded party leader name
    pub fn party_leader(&self) -> &str {
        &self.party_leader
    }

    /// Full session URL, empty after [`SessionKey::clear`]
    pub fn session_url(&self) -> &str {
        &self.url
    }

    pub fn set_session_id(&mut self, raw: &str) {
        self.session_id = percent_encode(raw);
        self.recompute();
    }

    pub fn set_party_leader(&mut self, raw: &str) {
        self.party_leader = percent_encode(raw);
        self.recompute();
    }

    /// Forget the session; the key is no longer addressable
    pub fn clear(&mut self) {
        self.session_id.clear();
        self.party_leader.clear();
        self.url.clear();
    }

    /// True when every component needed to address a session is present
    pub fn is_addressable(&self) -> bool {
        !self.base_url.is_empty()
            && !self.session_id.is_empty()
            && !self.party_leader.is_empty()
            && !self.url.is_empty()
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.url, endpoint.path())
    }

    fn recompute(&mut self) {
        self.url = format!(
            "{}/session/{}{}",
            self.base_url, self.session_id, self.party_leader
        );
    }
}
