//! In-process relay
//!
//! Implements the relay's route table without a network: sessions keyed by
//! `<id><leader>`, each holding the tracked monsters' part health and
//! ailment buildup. Used for tests and offline runs. The most recent requested
//! paths are recorded, and the relay can be switched offline to simulate an
//! outage.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use huntsync_core::{Status, MONSTER_SLOTS};
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::protocol::{RawResponse, Response};
use crate::transport::Transport;

/// Parts tracked per monster unless configured otherwise
const DEFAULT_PART_CAPACITY: usize = 16;

/// Ailments tracked per monster unless configured otherwise
const DEFAULT_AILMENT_CAPACITY: usize = 32;

/// Requested paths kept before the oldest are dropped
const DEFAULT_REQUEST_LOG_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
struct MonsterState {
    parts: Vec<u32>,
    ailments: Vec<u32>,
}

impl MonsterState {
    fn new(parts: usize, ailments: usize) -> Self {
        Self {
            parts: vec![0; parts],
            ailments: vec![0; ailments],
        }
    }
}

#[derive(Debug)]
struct RelayState {
    sessions: HashMap<String, Vec<MonsterState>>,
    requests: VecDeque<String>,
}

/// In-memory relay handle
#[derive(Debug)]
pub struct InMemoryRelay {
    base_url: String,
    version: u32,
    monster_capacity: usize,
    part_capacity: usize,
    ailment_capacity: usize,
    request_log_capacity: usize,
    offline: AtomicBool,
    state: Mutex<RelayState>,
}

impl InMemoryRelay {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version: 1,
            monster_capacity: MONSTER_SLOTS,
            part_capacity: DEFAULT_PART_CAPACITY,
            ailment_capacity: DEFAULT_AILMENT_CAPACITY,
            request_log_capacity: DEFAULT_REQUEST_LOG_CAPACITY,
            offline: AtomicBool::new(false),
            state: Mutex::new(RelayState {
                sessions: HashMap::new(),
                requests: VecDeque::new(),
            }),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Number of monsters each session accepts (indices beyond are out of range)
    pub fn with_monster_capacity(mut self, monsters: usize) -> Self {
        self.monster_capacity = monsters;
        self
    }

    pub fn with_part_capacity(mut self, parts: usize) -> Self {
        self.part_capacity = parts;
        self
    }

    pub fn with_ailment_capacity(mut self, ailments: usize) -> Self {
        self.ailment_capacity = ailments;
        self
    }

    /// Keep at most `requests` paths in the request log (0 disables it)
    pub fn with_request_log_capacity(mut self, requests: usize) -> Self {
        self.request_log_capacity = requests;
        self
    }

    /// Refuse every request as if the relay were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Most recent requested paths, oldest first, relative to the base URL
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.iter().cloned().collect()
    }

    fn record(&self, path: &str) {
        if self.request_log_capacity == 0 {
            return;
        }
        let mut state = self.lock();
        while state.requests.len() >= self.request_log_capacity {
            state.requests.pop_front();
        }
        state.requests.push_back(path.to_string());
    }

    pub fn has_session(&self, key: &str) -> bool {
        self.lock().sessions.contains_key(key)
    }

    pub fn part_hp(&self, key: &str, monster: usize, part: usize) -> Option<u32> {
        let state = self.lock();
        state
            .sessions
            .get(key)?
            .get(monster)?
            .parts
            .get(part)
            .copied()
    }

    pub fn ailment_buildup(&self, key: &str, monster: usize, ailment: usize) -> Option<u32> {
        let state = self.lock();
        state
            .sessions
            .get(key)?
            .get(monster)?
            .ailments
            .get(ailment)
            .copied()
    }

    /// Seed a session's field the way a leader's push would
    pub fn seed_part_hp(&self, key: &str, monster: usize, part: usize, value: u32) {
        let mut state = self.lock();
        if let Some(slot) = state
            .sessions
            .get_mut(key)
            .and_then(|s| s.get_mut(monster))
            .and_then(|m| m.parts.get_mut(part))
        {
            *slot = value;
        }
    }

    pub fn seed_ailment_buildup(&self, key: &str, monster: usize, ailment: usize, value: u32) {
        let mut state = self.lock();
        if let Some(slot) = state
            .sessions
            .get_mut(key)
            .and_then(|s| s.get_mut(monster))
            .and_then(|m| m.ailments.get_mut(ailment))
        {
            *slot = value;
        }
    }

    /// Create a session directly, bypassing the route table
    pub fn open_session(&self, key: &str) {
        let monsters = self.fresh_monsters();
        self.lock().sessions.insert(key.to_string(), monsters);
    }

    fn fresh_monsters(&self) -> Vec<MonsterState> {
        (0..self.monster_capacity)
            .map(|_| MonsterState::new(self.part_capacity, self.ailment_capacity))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn route(&self, path: &str) -> Option<Response> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Some(Response::ok("")),
            ["version"] => Some(Response::ok(self.version.to_string())),
            ["session", key, rest @ ..] => self.route_session(key, rest),
            _ => None,
        }
    }

    fn route_session(&self, key: &str, rest: &[&str]) -> Option<Response> {
        let mut state = self.lock();

        match rest {
            ["create"] => {
                if state.sessions.contains_key(key) {
                    return Some(Response::new(
                        Status::SessionAlreadyExists,
                        "Session already exists",
                    ));
                }
                state.sessions.insert(key.to_string(), self.fresh_monsters());
                return Some(Response::ok(""));
            }
            ["exists"] => {
                return Some(if state.sessions.contains_key(key) {
                    Response::ok("")
                } else {
                    Response::new(Status::SessionDoesNotExist, "Session does not exist")
                });
            }
            ["delete"] => {
                return Some(match state.sessions.remove(key) {
                    Some(_) => Response::ok(""),
                    None => Response::new(Status::SessionDoesNotExist, "Session does not exist"),
                });
            }
            ["monster", ..] => {}
            _ => return None,
        }

        let Some(monsters) = state.sessions.get_mut(key) else {
            return Some(Response::new(Status::SessionDoesNotExist, "Session does not exist"));
        };

        let (index, field) = match rest {
            ["monster", index, field @ ..] => (index.parse::<usize>().ok()?, field),
            _ => return None,
        };
        let Some(monster) = monsters.get_mut(index) else {
            return Some(Response::new(
                Status::MonsterOutsideRange,
                format!("Monster {} outside range", index),
            ));
        };

        match field {
            ["clear"] => {
                *monster = MonsterState::new(self.part_capacity, self.ailment_capacity);
                Some(Response::ok(""))
            }
            ["part", part, "current_hp", value @ ..] => access(
                &mut monster.parts,
                part,
                value,
                Status::PartOutsideRange,
                "Part",
            ),
            ["ailment", ailment, "current_buildup", value @ ..] => access(
                &mut monster.ailments,
                ailment,
                value,
                Status::AilmentOutsideRange,
                "Ailment",
            ),
            _ => None,
        }
    }
}

/// Read (`value` empty) or write one field
fn access(
    fields: &mut [u32],
    index: &str,
    value: &[&str],
    out_of_range: Status,
    label: &str,
) -> Option<Response> {
    let index = index.parse::<usize>().ok()?;
    let Some(field) = fields.get_mut(index) else {
        return Some(Response::new(
            out_of_range,
            format!("{} {} outside range", label, index),
        ));
    };

    match value {
        [] => Some(Response::ok(field.to_string())),
        [v] => {
            *field = v.parse().ok()?;
            Some(Response::ok(""))
        }
        _ => None,
    }
}

impl Transport for InMemoryRelay {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let path = url
            .strip_prefix(&self.base_url)
            .ok_or_else(|| TransportError::InvalidUrl(url.to_string()))?
            .to_string();

        self.record(&path);

        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(format!(
                "{} is offline",
                self.base_url
            )));
        }

        let (http_status, response) = match self.route(&path) {
            Some(response) => (200, response),
            None => (404, Response::new(Status::E404, format!("No route for {}", path))),
        };
        debug!(path = %path, status = %response.status, "In-memory relay answered");

        let body = serde_json::to_string(&response)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", path, e)))?;
        Ok(RawResponse::new(http_status, body))
    }
}
