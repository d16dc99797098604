//! Conversation list synchronization.
//!
//! Summaries are fed from the same accepted-message stream as the stores, so
//! the list and the open conversation never disagree about the latest
//! message.

use indexmap::IndexMap;

use chatsync_core::domain::{ConversationSummary, Message, Participant, ParticipantRole};

/// Keeps one summary per participant.
#[derive(Debug, Clone, Default)]
pub struct ConversationListSynchronizer {
    summaries: IndexMap<String, ConversationSummary>,
}

impl ConversationListSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fetched conversation list.
    ///
    /// Server counts win. A locally known `last_message` survives when it is
    /// newer than the fetched one, and summaries the fetch did not mention
    /// are kept.
    pub fn seed(&mut self, fetched: Vec<ConversationSummary>) {
        for mut summary in fetched {
            if let Some(local) = self.summaries.get(&summary.participant_id) {
                if local.last_activity() > summary.last_activity() {
                    summary.last_message.clone_from(&local.last_message);
                }
            }
            self.summaries
                .insert(summary.participant_id.clone(), summary);
        }
    }

    /// Make sure a summary exists. Returns true if one was created.
    ///
    /// A known participant whose summary was synthesized from a bare id
    /// picks up the name and role.
    pub fn ensure(&mut self, participant: Participant) -> bool {
        match self.summaries.get_mut(&participant.id) {
            Some(existing) => {
                let synthesized = existing.participant_name == existing.participant_id;
                if synthesized && participant.name != participant.id {
                    existing.participant_name = participant.name;
                }
                if existing.participant_role == ParticipantRole::Unknown {
                    existing.participant_role = participant.role;
                }
                false
            }
            None => {
                self.summaries.insert(
                    participant.id.clone(),
                    ConversationSummary::empty(participant),
                );
                true
            }
        }
    }

    /// A NEW message was accepted into `participant_id`'s conversation.
    pub fn on_message_accepted(&mut self, participant_id: &str, message: &Message, is_active: bool) {
        self.ensure(Participant::unnamed(participant_id));
        let Some(summary) = self.summaries.get_mut(participant_id) else {
            return;
        };
        if summary
            .last_activity()
            .is_none_or(|latest| message.created_at >= latest)
        {
            summary.last_message = Some(message.clone());
        }
        if message.from_id == participant_id && !is_active {
            summary.unread_count = summary.unread_count.saturating_add(1);
        }
    }

    /// Swap `previous_id` for `updated` if it is the shown last message.
    pub fn replace_last_message(&mut self, participant_id: &str, previous_id: &str, updated: &Message) {
        if let Some(summary) = self.summaries.get_mut(participant_id) {
            if summary
                .last_message
                .as_ref()
                .is_some_and(|m| m.id == previous_id)
            {
                summary.last_message = Some(updated.clone());
            }
        }
    }

    /// The shown last message `removed_id` is gone; fall back to `fallback`.
    pub fn revert_last_message(
        &mut self,
        participant_id: &str,
        removed_id: &str,
        fallback: Option<&Message>,
    ) {
        if let Some(summary) = self.summaries.get_mut(participant_id) {
            if summary
                .last_message
                .as_ref()
                .is_some_and(|m| m.id == removed_id)
            {
                summary.last_message = fallback.cloned();
            }
        }
    }

    /// Offer `message` as last message without touching unread counts.
    pub fn observe(&mut self, participant_id: &str, message: &Message) {
        if let Some(summary) = self.summaries.get_mut(participant_id) {
            if summary
                .last_activity()
                .is_none_or(|latest| message.created_at > latest)
            {
                summary.last_message = Some(message.clone());
            }
        }
    }

    pub fn mark_read(&mut self, participant_id: &str) {
        if let Some(summary) = self.summaries.get_mut(participant_id) {
            summary.unread_count = 0;
        }
    }

    pub fn remove(&mut self, participant_id: &str) -> Option<ConversationSummary> {
        self.summaries.shift_remove(participant_id)
    }

    pub fn get(&self, participant_id: &str) -> Option<&ConversationSummary> {
        self.summaries.get(participant_id)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    pub fn total_unread(&self) -> u32 {
        self.summaries
            .values()
            .map(|s| s.unread_count)
            .fold(0, u32::saturating_add)
    }

    /// Summaries with the most recent activity first; conversations without
    /// messages last, in insertion order.
    pub fn ordered(&self) -> Vec<ConversationSummary> {
        let mut list: Vec<ConversationSummary> = self.summaries.values().cloned().collect();
        list.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_inbound_for_inactive_counts_unread() {
        let mut list = ConversationListSynchronizer::new();
        list.on_message_accepted("p", &Message::new("1", "p", "me", "hi", at(10)), false);
        list.on_message_accepted("p", &Message::new("2", "p", "me", "yo", at(20)), false);

        let summary = list.get("p").unwrap();
        assert_eq!(summary.unread_count, 2);
        assert_eq!(summary.last_message.as_ref().unwrap().id, "2");
    }

    #[test]
    fn test_active_or_outbound_does_not_count() {
        let mut list = ConversationListSynchronizer::new();
        list.on_message_accepted("p", &Message::new("1", "p", "me", "hi", at(10)), true);
        list.on_message_accepted("p", &Message::new("2", "me", "p", "hi", at(20)), false);
        assert_eq!(list.get("p").unwrap().unread_count, 0);
    }

    #[test]
    fn test_older_message_does_not_replace_last() {
        let mut list = ConversationListSynchronizer::new();
        list.on_message_accepted("p", &Message::new("2", "p", "me", "new", at(20)), true);
        list.on_message_accepted("p", &Message::new("1", "p", "me", "old", at(10)), true);
        assert_eq!(list.get("p").unwrap().last_message.as_ref().unwrap().id, "2");
    }

    #[test]
    fn test_seed_keeps_local_only_and_newer_last_message() {
        let mut list = ConversationListSynchronizer::new();
        list.ensure(Participant::new("local", "Local Shop", ParticipantRole::Seller));
        list.on_message_accepted("p", &Message::new("9", "p", "me", "fresh", at(90)), false);

        let mut fetched = ConversationSummary::empty(Participant::new(
            "p",
            "Pat",
            ParticipantRole::Buyer,
        ));
        fetched.last_message = Some(Message::new("5", "p", "me", "stale", at(50)));
        fetched.unread_count = 4;
        list.seed(vec![fetched]);

        let p = list.get("p").unwrap();
        assert_eq!(p.participant_name, "Pat");
        assert_eq!(p.unread_count, 4);
        assert_eq!(p.last_message.as_ref().unwrap().id, "9");
        assert!(list.get("local").is_some());
    }

    #[test]
    fn test_total_unread_saturates() {
        let mut fetched = Vec::new();
        for (id, unread) in [("a", u32::MAX - 1), ("b", 5)] {
            let mut summary = ConversationSummary::empty(Participant::unnamed(id));
            summary.unread_count = unread;
            fetched.push(summary);
        }
        let mut list = ConversationListSynchronizer::new();
        list.seed(fetched);
        assert_eq!(list.total_unread(), u32::MAX);

        list.mark_read("a");
        assert_eq!(list.total_unread(), 5);
    }

    #[test]
    fn test_ensure_fills_in_synthesized_name() {
        let mut list = ConversationListSynchronizer::new();
        assert!(list.ensure(Participant::unnamed("s1")));
        assert!(!list.ensure(Participant::new("s1", "Shop", ParticipantRole::Seller)));
        let s = list.get("s1").unwrap();
        assert_eq!(s.participant_name, "Shop");
        assert_eq!(s.participant_role, ParticipantRole::Seller);
    }

    #[test]
    fn test_replace_and_revert_last_message() {
        let mut list = ConversationListSynchronizer::new();
        let earlier = Message::new("1", "p", "me", "earlier", at(5));
        let local = Message::provisional("me", "p", "hi", at(10), 0);
        list.on_message_accepted("p", &earlier, true);
        list.on_message_accepted("p", &local, true);

        let confirmed = Message::new("srv", "me", "p", "hi", at(10));
        list.replace_last_message("p", &local.id, &confirmed);
        assert_eq!(list.get("p").unwrap().last_message.as_ref().unwrap().id, "srv");

        list.revert_last_message("p", "srv", Some(&earlier));
        assert_eq!(list.get("p").unwrap().last_message.as_ref().unwrap().id, "1");
    }

    #[test]
    fn test_ordered_most_recent_first() {
        let mut list = ConversationListSynchronizer::new();
        list.ensure(Participant::unnamed("empty"));
        list.on_message_accepted("a", &Message::new("1", "a", "me", "x", at(10)), true);
        list.on_message_accepted("b", &Message::new("2", "b", "me", "x", at(20)), true);

        let order: Vec<String> = list.ordered().into_iter().map(|s| s.participant_id).collect();
        assert_eq!(order, ["b", "a", "empty"]);
    }

    #[test]
    fn test_mark_read() {
        let mut list = ConversationListSynchronizer::new();
        list.on_message_accepted("p", &Message::new("1", "p", "me", "x", at(10)), false);
        assert_eq!(list.total_unread(), 1);
        list.mark_read("p");
        assert_eq!(list.total_unread(), 0);
    }
}
