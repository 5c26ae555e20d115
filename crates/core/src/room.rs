//! Room membership state
//!
//! A `Room` is the single owner of the member list and the negotiated
//! game-server port. Every mutation takes the write lock for the whole
//! lookup-then-modify step, so membership changes are linearizable with
//! respect to lookup by `machine_id`.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::invariants::assert_room_invariants;
use crate::models::Member;

#[derive(Debug, Default)]
struct RoomInner {
    /// Join order
    members: Vec<Member>,
    server_port: u16,
}

/// Shared room state for one session
#[derive(Debug, Default)]
pub struct Room {
    inner: RwLock<RoomInner>,
}

impl Room {
    /// Room seeded with its host, as created by the server side
    pub fn hosted(host: Member, server_port: u16) -> Self {
        Self {
            inner: RwLock::new(RoomInner {
                members: vec![host],
                server_port,
            }),
        }
    }

    /// Empty mirror used by clients until the join sequence completes
    pub fn mirror() -> Self {
        Self::default()
    }

    /// Append `member` unless its `machine_id` is already present.
    /// Returns true if the member was added.
    pub fn join(&self, member: Member) -> bool {
        let mut inner = self.write();
        if inner
            .members
            .iter()
            .any(|m| m.machine_id == member.machine_id)
        {
            return false;
        }

        tracing::info!(
            name = %member.name,
            machine_id = %member.machine_id,
            kind = %member.kind,
            "Member joined room"
        );
        inner.members.push(member);
        assert_room_invariants(&inner.members);
        true
    }

    /// Remove the member with `machine_id`, returning it if present
    pub fn leave(&self, machine_id: &str) -> Option<Member> {
        let mut inner = self.write();
        let index = inner
            .members
            .iter()
            .position(|m| m.machine_id == machine_id)?;
        let member = inner.members.remove(index);
        tracing::info!(name = %member.name, machine_id = %machine_id, "Member left room");
        Some(member)
    }

    pub fn contains(&self, machine_id: &str) -> bool {
        self.read().members.iter().any(|m| m.machine_id == machine_id)
    }

    /// Snapshot of the member list in join order
    pub fn members(&self) -> Vec<Member> {
        self.read().members.clone()
    }

    pub fn len(&self) -> usize {
        self.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().members.is_empty()
    }

    /// Replace the whole list with an authoritative copy from the host.
    /// Later duplicates of a `machine_id` are dropped.
    pub fn replace_members(&self, members: Vec<Member>) {
        let mut deduped: Vec<Member> = Vec::with_capacity(members.len());
        for member in members {
            if !deduped.iter().any(|m| m.machine_id == member.machine_id) {
                deduped.push(member);
            }
        }

        let mut inner = self.write();
        inner.members = deduped;
        assert_room_invariants(&inner.members);
    }

    /// Game-server port; zero until known
    pub fn server_port(&self) -> u16 {
        self.read().server_port
    }

    pub fn set_server_port(&self, port: u16) {
        self.write().server_port = port;
    }

    // Guarded sections never panic, so a poisoned lock still holds valid state.
    fn read(&self) -> RwLockReadGuard<'_, RoomInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoomInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::MemberKind;

    fn alice() -> Member {
        Member::new("Alice", "abc", "v1", MemberKind::Host)
    }

    fn bob() -> Member {
        Member::new("Bob", "def", "v2", MemberKind::Guest)
    }

    #[test]
    fn test_join_is_idempotent() {
        let room = Room::hosted(alice(), 25565);

        assert!(room.join(bob()));
        assert!(!room.join(bob()));

        let members = room.members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "Alice");
        assert_eq!(members[1].name, "Bob");
    }

    #[test]
    fn test_join_keys_on_machine_id_only() {
        let room = Room::mirror();
        room.join(bob());
        room.join(Member::new("Bobby", "def", "other", MemberKind::Guest));

        assert_eq!(room.len(), 1);
        assert_eq!(room.members()[0].name, "Bob");
    }

    #[test]
    fn test_leave() {
        let room = Room::hosted(alice(), 25565);
        room.join(bob());

        let left = room.leave("def").unwrap();
        assert_eq!(left.name, "Bob");
        assert!(room.leave("def").is_none());
        assert!(!room.contains("def"));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_replace_members_drops_duplicates() {
        let room = Room::mirror();
        room.replace_members(vec![alice(), bob(), alice()]);

        let members = room.members();
        assert_eq!(members, vec![alice(), bob()]);
    }

    #[test]
    fn test_server_port() {
        let room = Room::mirror();
        assert_eq!(room.server_port(), 0);
        room.set_server_port(25565);
        assert_eq!(room.server_port(), 25565);
    }

    #[test]
    fn test_concurrent_joins_keep_one_entry() {
        let room = Arc::new(Room::hosted(alice(), 25565));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let room = room.clone();
                std::thread::spawn(move || room.join(bob()))
            })
            .collect();
        let added = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|added| *added)
            .count();

        assert_eq!(added, 1);
        assert_eq!(room.len(), 2);
    }
}
