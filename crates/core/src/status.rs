//! Relay outcome codes and the per-session tally
//!
//! Every relay operation resolves to exactly one [`Status`]. The
//! [`StatusTally`] counts them for the lifetime of one session so the
//! end-of-session summary and the "first occurrence" log gate can be
//! computed without keeping any history.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome code returned by the relay (or synthesized locally)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Status {
    Ok,
    SessionDoesNotExist,
    SessionAlreadyExists,
    MonsterOutsideRange,
    PartOutsideRange,
    AilmentOutsideRange,
    /// Local failure: transport, decode, or anything else client-side
    Exception,
    E404,
}

impl Status {
    /// All codes in wire order
    pub const ALL: [Status; 8] = [
        Status::Ok,
        Status::SessionDoesNotExist,
        Status::SessionAlreadyExists,
        Status::MonsterOutsideRange,
        Status::PartOutsideRange,
        Status::AilmentOutsideRange,
        Status::Exception,
        Status::E404,
    ];

    /// Integer code used on the wire
    pub fn code(self) -> i64 {
        match self {
            Status::Ok => 0,
            Status::SessionDoesNotExist => 1,
            Status::SessionAlreadyExists => 2,
            Status::MonsterOutsideRange => 3,
            Status::PartOutsideRange => 4,
            Status::AilmentOutsideRange => 5,
            Status::Exception => 10,
            Status::E404 => 404,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::SessionDoesNotExist => "sessionDoesNotExist",
            Status::SessionAlreadyExists => "sessionAlreadyExists",
            Status::MonsterOutsideRange => "monsterOutsideRange",
            Status::PartOutsideRange => "partOutsideRange",
            Status::AilmentOutsideRange => "ailmentOutsideRange",
            Status::Exception => "exception",
            Status::E404 => "e404",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    fn index(self) -> usize {
        match self {
            Status::Ok => 0,
            Status::SessionDoesNotExist => 1,
            Status::SessionAlreadyExists => 2,
            Status::MonsterOutsideRange => 3,
            Status::PartOutsideRange => 4,
            Status::AilmentOutsideRange => 5,
            Status::Exception => 6,
            Status::E404 => 7,
        }
    }
}

impl TryFrom<i64> for Status {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Status::ALL
            .into_iter()
            .find(|s| s.code() == code)
            .ok_or_else(|| format!("unknown status code {}", code))
    }
}

impl From<Status> for i64 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Occurrence count per [`Status`] since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTally {
    counts: [u32; Status::ALL.len()],
}

impl StatusTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, status: Status) {
        self.counts[status.index()] = self.counts[status.index()].saturating_add(1);
    }

    pub fn count(&self, status: Status) -> u32 {
        self.counts[status.index()]
    }

    /// Sum of every bucket except `ok`
    pub fn error_count(&self) -> u32 {
        Status::ALL
            .into_iter()
            .filter(|s| !s.is_ok())
            .map(|s| self.count(s))
            .sum()
    }

    pub fn clear(&mut self) {
        self.counts = Default::default();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|c| *c == 0)
    }
}

/// One `"<code> - <count>"` line per non-zero bucket
impl fmt::Display for StatusTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for status in Status::ALL {
            let count = self.count(status);
            if count > 0 {
                writeln!(f, "{} - {}", status, count)?;
            }
        }
        Ok(())
    }
}
