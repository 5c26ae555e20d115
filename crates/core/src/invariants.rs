//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::models::Member;

/// A `machine_id` appears at most once in a room's member list
pub fn assert_room_invariants(members: &[Member]) {
    if cfg!(debug_assertions) {
        let mut seen = HashSet::new();
        for member in members {
            debug_assert!(
                seen.insert(member.machine_id.as_str()),
                "machine_id {} appears more than once in the room",
                member.machine_id
            );
        }
    }
}
