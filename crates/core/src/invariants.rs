//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::Role;
use crate::session::SessionKey;
use crate::status::StatusTally;

/// An addressable key exists exactly while a session is active
pub fn assert_session_invariants(role: Role, key: &SessionKey) {
    debug_assert!(
        !role.in_session() || key.is_addressable(),
        "Role {:?} without an addressable session key",
        role
    );

    debug_assert!(
        role.in_session() || key.party_leader().is_empty(),
        "Not in session but party leader {:?} is still set",
        key.party_leader()
    );
}

/// The tally must be flushed whenever a session ends
pub fn assert_tally_flushed(tally: &StatusTally) {
    debug_assert!(tally.is_empty(), "Status tally not reset: {}", tally);
}
