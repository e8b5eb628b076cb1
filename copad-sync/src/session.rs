//! Session store: the local participant and the roster of a room.
//!
//! The store exclusively owns membership state. The local participant's
//! record lives in the roster like any other and is distinguished only
//! by session-id equality. Iteration order is display order; it carries
//! no other meaning.

use std::collections::HashMap;

use uuid::Uuid;

use crate::protocol::Participant;

/// Membership state for one room session.
#[derive(Debug, Default)]
pub struct SessionStore {
    local: Option<Participant>,
    roster: HashMap<Uuid, Participant>,
    /// Display order of roster entries (join order).
    order: Vec<Uuid>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The local participant, `None` until a join has been acknowledged.
    pub fn local_participant(&self) -> Option<&Participant> {
        self.local.as_ref()
    }

    /// Whether `session_id` identifies the local participant.
    pub fn is_local(&self, session_id: Uuid) -> bool {
        self.local
            .as_ref()
            .is_some_and(|p| p.session_id == session_id)
    }

    /// Install the acknowledged identity and the full initial roster.
    ///
    /// Resets all prior state, so a re-join lands on a clean store.
    pub fn on_joined(&mut self, local: Participant, initial_roster: Vec<Participant>) {
        self.roster.clear();
        self.order.clear();

        for member in initial_roster {
            if self.roster.insert(member.session_id, member.clone()).is_none() {
                self.order.push(member.session_id);
            }
        }
        // The server includes the local participant in the roster; make
        // sure the record exists even if a server omits it.
        if self.roster.insert(local.session_id, local.clone()).is_none() {
            self.order.push(local.session_id);
        }
        self.local = Some(local);
    }

    /// Insert a newly announced member.
    ///
    /// Returns whether the roster changed: duplicate announcements and a
    /// server echoing the local participant's own join are absorbed.
    pub fn on_member_joined(&mut self, member: Participant) -> bool {
        if self.roster.contains_key(&member.session_id) {
            return false;
        }
        self.order.push(member.session_id);
        self.roster.insert(member.session_id, member);
        true
    }

    /// Remove a departed member, returning their record.
    ///
    /// `None` when the member is already gone, so duplicate departure
    /// notifications are a no-op.
    pub fn on_member_left(&mut self, session_id: Uuid) -> Option<Participant> {
        let removed = self.roster.remove(&session_id)?;
        self.order.retain(|id| *id != session_id);
        Some(removed)
    }

    /// Look up a member by session id.
    pub fn member(&self, session_id: Uuid) -> Option<&Participant> {
        self.roster.get(&session_id)
    }

    /// Roster in display order.
    pub fn members(&self) -> Vec<&Participant> {
        self.order
            .iter()
            .filter_map(|id| self.roster.get(id))
            .collect()
    }

    /// Number of members, local participant included.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Drop all membership state (room teardown).
    pub fn clear(&mut self) {
        self.local = None;
        self.roster.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str) -> Participant {
        Participant {
            session_id: Uuid::new_v4(),
            username: name.into(),
            color: "#3498db".into(),
        }
    }

    #[test]
    fn test_empty_until_joined() {
        let store = SessionStore::new();
        assert!(store.local_participant().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_on_joined_installs_roster() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        let bob = participant("Bob");

        store.on_joined(alice.clone(), vec![alice.clone(), bob.clone()]);

        assert_eq!(store.local_participant(), Some(&alice));
        assert_eq!(store.len(), 2);
        assert!(store.is_local(alice.session_id));
        assert!(!store.is_local(bob.session_id));
    }

    #[test]
    fn test_on_joined_resets_previous_session() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        let bob = participant("Bob");
        store.on_joined(alice.clone(), vec![alice.clone(), bob]);

        // Re-join as a fresh identity into a different roster.
        let alice2 = participant("Alice");
        store.on_joined(alice2.clone(), vec![alice2.clone()]);

        assert_eq!(store.len(), 1);
        assert!(store.is_local(alice2.session_id));
        assert!(!store.is_local(alice.session_id));
    }

    #[test]
    fn test_on_joined_tolerates_roster_without_self() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        let bob = participant("Bob");

        store.on_joined(alice.clone(), vec![bob]);

        assert_eq!(store.len(), 2);
        assert!(store.member(alice.session_id).is_some());
    }

    #[test]
    fn test_member_joined_inserts_once() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        store.on_joined(alice.clone(), vec![alice]);

        let bob = participant("Bob");
        assert!(store.on_member_joined(bob.clone()));
        assert!(!store.on_member_joined(bob));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_member_joined_never_duplicates_local() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        store.on_joined(alice.clone(), vec![alice.clone()]);

        // Server echoes the local participant's own join.
        assert!(!store.on_member_joined(alice));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_member_left_idempotent() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        let bob = participant("Bob");
        store.on_joined(alice.clone(), vec![alice, bob.clone()]);

        let removed = store.on_member_left(bob.session_id);
        assert_eq!(removed.map(|p| p.username), Some("Bob".to_string()));
        assert_eq!(store.len(), 1);

        // Duplicate departure: roster size unchanged, no record returned.
        assert!(store.on_member_left(bob.session_id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_members_in_join_order() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        store.on_joined(alice.clone(), vec![alice]);
        store.on_member_joined(participant("Bob"));
        store.on_member_joined(participant("Carol"));

        let names: Vec<&str> = store.members().iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_clear() {
        let mut store = SessionStore::new();
        let alice = participant("Alice");
        store.on_joined(alice.clone(), vec![alice]);

        store.clear();
        assert!(store.local_participant().is_none());
        assert!(store.is_empty());
    }
}
