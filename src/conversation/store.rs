use std::{collections::HashMap, mem};

use crate::model::{ContactSnapshot, Message, User, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Inactive,
    Loading,
    Active,
}

/// Tags a history request with the selection it was made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryTicket {
    pub(crate) user_id: UserId,
    selection: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContactsTicket(u64);

/// Where an incoming message went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Routed {
    Appended(Message),
    Unseen { user_id: UserId, count: u32 },
    /// Already in the open conversation.
    Duplicate,
    /// Neither sent by nor addressed to the local user.
    Foreign,
}

/// Contacts, the open conversation and the unseen counters.
///
/// Pure state: every network round trip happens outside, and results come
/// back through tickets so that late answers can be recognised and dropped.
#[derive(Debug, Default)]
pub struct ConversationStore {
    contacts: Vec<User>,
    unseen: HashMap<UserId, u32>,
    active: Option<UserId>,
    loading: bool,
    messages: Vec<Message>,
    selection: u64,
    contacts_requested: u64,
    contacts_applied: u64,
}

impl ConversationStore {
    pub fn contacts(&self) -> &[User] {
        &self.contacts
    }

    /// Case-insensitive name search; a blank query matches everyone.
    pub fn filter_contacts(&self, query: &str) -> Vec<&User> {
        let query = query.trim().to_lowercase();
        self.contacts
            .iter()
            .filter(|user| query.is_empty() || user.full_name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn active(&self) -> Option<&UserId> {
        self.active.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn unseen(&self, user_id: &UserId) -> u32 {
        self.unseen.get(user_id).copied().unwrap_or(0)
    }

    pub fn unseen_counts(&self) -> &HashMap<UserId, u32> {
        &self.unseen
    }

    pub fn state_of(&self, user_id: &UserId) -> ConversationState {
        match &self.active {
            Some(active) if active == user_id && self.loading => ConversationState::Loading,
            Some(active) if active == user_id => ConversationState::Active,
            _ => ConversationState::Inactive,
        }
    }

    pub(crate) fn begin_contacts(&mut self) -> ContactsTicket {
        self.contacts_requested += 1;
        ContactsTicket(self.contacts_requested)
    }

    /// Replaces contacts and counters with the snapshot, unless a newer
    /// snapshot has already been applied.
    pub(crate) fn apply_contacts(&mut self, ticket: ContactsTicket, snapshot: ContactSnapshot) -> bool {
        if ticket.0 <= self.contacts_applied {
            return false;
        }
        self.contacts_applied = ticket.0;

        let mut contacts: Vec<User> = Vec::with_capacity(snapshot.users.len());
        for user in snapshot.users {
            if !contacts.iter().any(|known| known.id == user.id) {
                contacts.push(user);
            }
        }
        self.contacts = contacts;
        self.unseen = snapshot.unseen;
        if let Some(active) = &self.active {
            self.unseen.insert(active.clone(), 0);
        }
        true
    }

    pub(crate) fn select(&mut self, user_id: UserId) -> HistoryTicket {
        self.selection += 1;
        self.unseen.insert(user_id.clone(), 0);
        self.messages.clear();
        self.loading = true;
        self.active = Some(user_id.clone());
        HistoryTicket {
            user_id,
            selection: self.selection,
        }
    }

    /// Installs fetched history if `ticket` is still the current selection.
    /// Messages pushed while loading survive when the history lacks them.
    pub(crate) fn apply_history(
        &mut self,
        ticket: &HistoryTicket,
        local: &UserId,
        history: Vec<Message>,
    ) -> Option<usize> {
        if self.selection != ticket.selection || self.active.as_ref() != Some(&ticket.user_id) {
            return None;
        }

        let pushed = mem::take(&mut self.messages);
        self.messages = history
            .into_iter()
            .filter(|message| message.counterpart(local) == Some(&ticket.user_id))
            .collect();
        for message in pushed {
            if !self.messages.iter().any(|known| known.id == message.id) {
                self.messages.push(message);
            }
        }
        self.loading = false;
        Some(self.messages.len())
    }

    /// Leaves LOADING after a failed fetch. The conversation stays open
    /// with whatever was pushed meanwhile.
    pub(crate) fn abandon_history(&mut self, ticket: &HistoryTicket) -> bool {
        if self.selection != ticket.selection || self.active.as_ref() != Some(&ticket.user_id) {
            return false;
        }
        self.loading = false;
        true
    }

    pub(crate) fn deselect(&mut self) -> bool {
        self.selection += 1;
        self.messages.clear();
        self.loading = false;
        self.active.take().is_some()
    }

    /// Exactly one of append-to-open-conversation or bump-unseen.
    pub(crate) fn route_incoming(&mut self, local: &UserId, message: Message) -> Routed {
        let Some(counterpart) = message.counterpart(local).cloned() else {
            return Routed::Foreign;
        };

        if self.active.as_ref() == Some(&counterpart) {
            if self.messages.iter().any(|known| known.id == message.id) {
                return Routed::Duplicate;
            }
            self.messages.push(message.clone());
            return Routed::Appended(message);
        }

        let count = self.unseen.entry(counterpart.clone()).or_insert(0);
        *count += 1;
        Routed::Unseen {
            user_id: counterpart,
            count: *count,
        }
    }

    /// Appends a message the service just confirmed, if its conversation is
    /// still the open one.
    pub(crate) fn append_confirmed(&mut self, local: &UserId, message: &Message) -> bool {
        let open = message
            .counterpart(local)
            .is_some_and(|counterpart| self.active.as_ref() == Some(counterpart));
        if !open || self.messages.iter().any(|known| known.id == message.id) {
            return false;
        }
        self.messages.push(message.clone());
        true
    }

    /// Back to nothing selected and nothing known. Sequence numbers keep
    /// counting so answers to requests made before the clear are ignored.
    pub(crate) fn clear(&mut self) {
        let selection = self.selection + 1;
        let contacts_requested = self.contacts_requested;
        *self = Self {
            selection,
            contacts_requested,
            contacts_applied: contacts_requested,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;
    use crate::model::MessageId;

    fn user(id: &str, name: &str) -> User {
        User {
            id: UserId::from(id),
            full_name: name.to_owned(),
            avatar: None,
            bio: None,
        }
    }

    fn message(id: &str, from: &str, to: &str) -> Message {
        Message {
            id: MessageId::new(id),
            sender: UserId::from(from),
            recipient: UserId::from(to),
            text: Some(format!("{id} from {from}")),
            image: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn me() -> UserId {
        UserId::from("me")
    }

    #[test]
    fn incoming_for_closed_conversation_only_counts() {
        let mut store = ConversationStore::default();
        let routed = store.route_incoming(&me(), message("m1", "a", "me"));
        assert_eq!(
            routed,
            Routed::Unseen {
                user_id: UserId::from("a"),
                count: 1
            }
        );
        assert!(store.messages().is_empty());
    }

    #[test]
    fn incoming_for_open_conversation_only_appends() {
        let mut store = ConversationStore::default();
        let ticket = store.select(UserId::from("a"));
        store.apply_history(&ticket, &me(), vec![message("m0", "me", "a")]);

        let routed = store.route_incoming(&me(), message("m1", "a", "me"));
        assert!(matches!(routed, Routed::Appended(_)));
        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.unseen(&UserId::from("a")), 0);

        assert_eq!(store.route_incoming(&me(), message("m1", "a", "me")), Routed::Duplicate);
        assert_eq!(store.messages().len(), 2);
    }

    #[test]
    fn foreign_messages_are_rejected() {
        let mut store = ConversationStore::default();
        assert_eq!(store.route_incoming(&me(), message("m1", "a", "b")), Routed::Foreign);
        assert!(store.unseen_counts().is_empty());
    }

    #[test]
    fn selection_resets_unseen_and_walks_the_states() {
        let mut store = ConversationStore::default();
        let a = UserId::from("a");
        store.route_incoming(&me(), message("m1", "a", "me"));
        store.route_incoming(&me(), message("m2", "a", "me"));
        assert_eq!(store.unseen(&a), 2);

        let ticket = store.select(a.clone());
        assert_eq!(store.unseen(&a), 0);
        assert_eq!(store.state_of(&a), ConversationState::Loading);

        store.apply_history(&ticket, &me(), vec![message("m1", "a", "me"), message("m2", "a", "me")]);
        assert_eq!(store.state_of(&a), ConversationState::Active);

        store.deselect();
        assert_eq!(store.state_of(&a), ConversationState::Inactive);
        assert!(store.active().is_none());
    }

    #[test]
    fn stale_history_is_discarded() {
        let mut store = ConversationStore::default();
        let stale = store.select(UserId::from("a"));
        let fresh = store.select(UserId::from("b"));

        assert_eq!(store.apply_history(&fresh, &me(), vec![message("b1", "b", "me")]), Some(1));
        assert_eq!(store.apply_history(&stale, &me(), vec![message("a1", "a", "me")]), None);
        assert_eq!(store.messages()[0].id, MessageId::new("b1"));
    }

    #[test]
    fn reselecting_the_same_user_invalidates_the_first_fetch() {
        let mut store = ConversationStore::default();
        let first = store.select(UserId::from("a"));
        let second = store.select(UserId::from("a"));
        assert_eq!(store.apply_history(&first, &me(), vec![message("a1", "a", "me")]), None);
        assert_eq!(store.apply_history(&second, &me(), vec![]), Some(0));
    }

    #[test]
    fn history_after_deselect_is_discarded() {
        let mut store = ConversationStore::default();
        let ticket = store.select(UserId::from("a"));
        store.deselect();
        assert_eq!(store.apply_history(&ticket, &me(), vec![message("a1", "a", "me")]), None);
        assert!(store.messages().is_empty());
    }

    #[test]
    fn failed_fetch_only_settles_the_current_selection() {
        let mut store = ConversationStore::default();
        let stale = store.select(UserId::from("a"));
        let current = store.select(UserId::from("b"));
        assert!(!store.abandon_history(&stale));
        assert_eq!(store.state_of(&UserId::from("b")), ConversationState::Loading);

        store.route_incoming(&me(), message("live", "b", "me"));
        assert!(store.abandon_history(&current));
        assert_eq!(store.state_of(&UserId::from("b")), ConversationState::Active);
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn pushes_during_loading_survive_the_history() {
        let mut store = ConversationStore::default();
        let ticket = store.select(UserId::from("a"));
        store.route_incoming(&me(), message("live", "a", "me"));

        let applied = store.apply_history(
            &ticket,
            &me(),
            vec![message("old", "a", "me"), message("x", "c", "me")],
        );
        assert_eq!(applied, Some(2));
        let ids: Vec<_> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["old", "live"]);
    }

    #[test]
    fn contacts_replace_wholesale_without_duplicates() {
        let mut store = ConversationStore::default();
        let ticket = store.begin_contacts();
        let snapshot = ContactSnapshot {
            users: vec![user("a", "Alice"), user("b", "Bob"), user("a", "Alice")],
            unseen: HashMap::from([(UserId::from("b"), 3)]),
        };
        assert!(store.apply_contacts(ticket, snapshot.clone()));
        assert_eq!(store.contacts().len(), 2);
        assert_eq!(store.unseen(&UserId::from("b")), 3);

        let ticket = store.begin_contacts();
        assert!(store.apply_contacts(ticket, ContactSnapshot {
            users: vec![user("b", "Bob")],
            unseen: HashMap::new(),
        }));
        assert_eq!(store.contacts().len(), 1);
        assert_eq!(store.unseen(&UserId::from("b")), 0);
    }

    #[test]
    fn older_contact_answers_lose() {
        let mut store = ConversationStore::default();
        let older = store.begin_contacts();
        let newer = store.begin_contacts();
        assert!(store.apply_contacts(newer, ContactSnapshot {
            users: vec![user("b", "Bob")],
            unseen: HashMap::new(),
        }));
        assert!(!store.apply_contacts(older, ContactSnapshot {
            users: vec![user("a", "Alice")],
            unseen: HashMap::new(),
        }));
        assert_eq!(store.contacts()[0].id, UserId::from("b"));
    }

    #[test]
    fn snapshot_cannot_resurrect_unseen_for_open_conversation() {
        let mut store = ConversationStore::default();
        store.select(UserId::from("a"));
        let ticket = store.begin_contacts();
        store.apply_contacts(ticket, ContactSnapshot {
            users: vec![user("a", "Alice")],
            unseen: HashMap::from([(UserId::from("a"), 4)]),
        });
        assert_eq!(store.unseen(&UserId::from("a")), 0);
    }

    #[test]
    fn filter_is_case_insensitive() {
        let mut store = ConversationStore::default();
        let ticket = store.begin_contacts();
        store.apply_contacts(ticket, ContactSnapshot {
            users: vec![user("a", "Alice Smith"), user("b", "Bob")],
            unseen: HashMap::new(),
        });
        let names: Vec<_> = store.filter_contacts("SMI").iter().map(|u| u.full_name.as_str()).collect();
        assert_eq!(names, ["Alice Smith"]);
        assert_eq!(store.filter_contacts("  ").len(), 2);
    }

    #[test]
    fn confirmed_send_lands_only_in_its_own_conversation() {
        let mut store = ConversationStore::default();
        store.select(UserId::from("b"));
        assert!(!store.append_confirmed(&me(), &message("s1", "me", "a")));
        assert!(store.append_confirmed(&me(), &message("s2", "me", "b")));
        assert!(!store.append_confirmed(&me(), &message("s2", "me", "b")));
        assert_eq!(store.messages().len(), 1);
    }

    #[test]
    fn clear_invalidates_outstanding_tickets() {
        let mut store = ConversationStore::default();
        let history = store.select(UserId::from("a"));
        let contacts = store.begin_contacts();
        store.clear();

        store.select(UserId::from("a"));
        assert_eq!(store.apply_history(&history, &me(), vec![]), None);
        assert!(!store.apply_contacts(contacts, ContactSnapshot::default()));
    }
}
