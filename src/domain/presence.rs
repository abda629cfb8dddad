use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// How long a typing indicator stays visible without a refresh.
const TYPING_TTL_MS: i64 = 5_000;

/// Online/offline and typing state for chat members.
///
/// Online flags are driven by presence frames; typing indicators are
/// timer-expired because the server sends no explicit "stopped typing"
/// signal when a client goes silent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceTracker {
    online: HashMap<String, bool>,
    // chat id -> user id -> last typing signal
    typing: HashMap<String, HashMap<String, DateTime<Utc>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&mut self, user_id: &str, online: bool) {
        self.online.insert(user_id.to_owned(), online);
    }

    /// `None` when no presence signal was ever seen for the user.
    pub fn is_online(&self, user_id: &str) -> Option<bool> {
        self.online.get(user_id).copied()
    }

    pub fn record_typing(&mut self, chat_id: &str, user_id: &str, at: DateTime<Utc>) {
        self.typing
            .entry(chat_id.to_owned())
            .or_default()
            .insert(user_id.to_owned(), at);
    }

    pub fn clear_typing(&mut self, chat_id: &str, user_id: &str) {
        if let Some(users) = self.typing.get_mut(chat_id) {
            users.remove(user_id);
        }
    }

    /// Users still considered typing in a chat at `now`, expired entries
    /// excluded. Order is sorted by user id for deterministic rendering.
    pub fn typing_users(&self, chat_id: &str, now: DateTime<Utc>) -> Vec<String> {
        let ttl = Duration::milliseconds(TYPING_TTL_MS);
        let mut users: Vec<String> = self
            .typing
            .get(chat_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, last_seen)| now.signed_duration_since(**last_seen) <= ttl)
                    .map(|(user_id, _)| user_id.clone())
                    .collect()
            })
            .unwrap_or_default();
        users.sort();
        users
    }

    /// Drops expired typing entries; called from periodic housekeeping.
    pub fn expire_typing(&mut self, now: DateTime<Utc>) {
        let ttl = Duration::milliseconds(TYPING_TTL_MS);
        for users in self.typing.values_mut() {
            users.retain(|_, last_seen| now.signed_duration_since(*last_seen) <= ttl);
        }
        self.typing.retain(|_, users| !users.is_empty());
    }

    pub fn clear(&mut self) {
        self.online.clear();
        self.typing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn unknown_user_has_no_presence_signal() {
        let tracker = PresenceTracker::new();

        assert_eq!(tracker.is_online("u1"), None);
    }

    #[test]
    fn set_online_records_latest_signal() {
        let mut tracker = PresenceTracker::new();

        tracker.set_online("u1", true);
        assert_eq!(tracker.is_online("u1"), Some(true));

        tracker.set_online("u1", false);
        assert_eq!(tracker.is_online("u1"), Some(false));
    }

    #[test]
    fn typing_users_reports_recent_signals() {
        let mut tracker = PresenceTracker::new();
        tracker.record_typing("c1", "u2", at(1_000));
        tracker.record_typing("c1", "u1", at(2_000));

        assert_eq!(tracker.typing_users("c1", at(3_000)), vec!["u1", "u2"]);
    }

    #[test]
    fn typing_users_excludes_expired_signals() {
        let mut tracker = PresenceTracker::new();
        tracker.record_typing("c1", "u1", at(1_000));
        tracker.record_typing("c1", "u2", at(9_000));

        assert_eq!(tracker.typing_users("c1", at(10_000)), vec!["u2"]);
    }

    #[test]
    fn clear_typing_removes_one_user() {
        let mut tracker = PresenceTracker::new();
        tracker.record_typing("c1", "u1", at(1_000));
        tracker.record_typing("c1", "u2", at(1_000));

        tracker.clear_typing("c1", "u1");

        assert_eq!(tracker.typing_users("c1", at(1_500)), vec!["u2"]);
    }

    #[test]
    fn expire_typing_prunes_stale_entries() {
        let mut tracker = PresenceTracker::new();
        tracker.record_typing("c1", "u1", at(1_000));
        tracker.record_typing("c2", "u2", at(20_000));

        tracker.expire_typing(at(20_500));

        assert!(tracker.typing_users("c1", at(20_500)).is_empty());
        assert_eq!(tracker.typing_users("c2", at(20_500)), vec!["u2"]);
    }

    #[test]
    fn clear_resets_all_state() {
        let mut tracker = PresenceTracker::new();
        tracker.set_online("u1", true);
        tracker.record_typing("c1", "u1", at(1_000));

        tracker.clear();

        assert_eq!(tracker.is_online("u1"), None);
        assert!(tracker.typing_users("c1", at(1_000)).is_empty());
    }
}
