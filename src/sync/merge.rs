use super::{Session, StorageMode};
use crate::models::{ChatMessage, ChatRole, DailyLogEntry, Goal, Habit};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::hash::Hash;

/// Identity used to recognise the same record on both sides of a merge.
pub trait MergeKey {
    type Key: Eq + Hash;

    fn merge_key(&self) -> Self::Key;
}

impl MergeKey for ChatMessage {
    type Key = (String, ChatRole);

    fn merge_key(&self) -> Self::Key {
        (self.content.clone(), self.role)
    }
}

impl MergeKey for DailyLogEntry {
    type Key = NaiveDate;

    fn merge_key(&self) -> Self::Key {
        self.date
    }
}

impl MergeKey for Habit {
    type Key = String;

    fn merge_key(&self) -> Self::Key {
        self.id.clone()
    }
}

impl MergeKey for Goal {
    type Key = String;

    fn merge_key(&self) -> Self::Key {
        self.id.clone()
    }
}

/// Remote-first view of a collection. Every local record whose key the remote
/// store does not hold is appended in local order, repeats included. Guests,
/// and callers with no remote answer, get `local` back untouched.
pub fn merge_history<T: MergeKey>(session: &Session, local: Vec<T>, remote: Option<Vec<T>>) -> Vec<T> {
    if session.mode() == StorageMode::Guest {
        return local;
    }
    let Some(mut merged) = remote else {
        return local;
    };

    let remote_keys: HashSet<T::Key> = merged.iter().map(MergeKey::merge_key).collect();
    merged.extend(
        local
            .into_iter()
            .filter(|item| !remote_keys.contains(&item.merge_key())),
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online() -> Session {
        Session::authenticated("u1", false)
    }

    #[test]
    fn test_unsynced_local_is_appended_once() {
        let a = ChatMessage::user("A");
        let b = ChatMessage::assistant("B");

        let merged = merge_history(&online(), vec![a.clone(), b.clone()], Some(vec![a.clone()]));
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].content, "A");
        assert_eq!(merged[1].content, "B");
    }

    #[test]
    fn test_repeated_unsynced_turns_are_kept() {
        let local = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("offline"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("offline"),
        ];
        let remote = vec![ChatMessage::user("hi")];

        let merged = merge_history(&online(), local, Some(remote));
        let contents: Vec<&str> = merged.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "ok", "offline", "ok", "offline"]);
    }

    #[test]
    fn test_guest_ignores_remote() {
        let local = vec![ChatMessage::user("mine")];
        let remote = vec![ChatMessage::user("theirs"), ChatMessage::user("other")];

        let merged = merge_history(&Session::guest(), local.clone(), Some(remote.clone()));
        assert_eq!(merged, local);

        let mut forced = online();
        forced.force_guest();
        assert_eq!(merge_history(&forced, local.clone(), Some(remote)), local);
    }

    #[test]
    fn test_missing_remote_returns_local() {
        let local = vec![ChatMessage::user("offline")];
        assert_eq!(merge_history(&online(), local.clone(), None), local);
    }

    #[test]
    fn test_same_text_different_role_is_distinct() {
        let remote = vec![ChatMessage::user("ok")];
        let local = vec![ChatMessage::assistant("ok")];
        assert_eq!(merge_history(&online(), local, Some(remote)).len(), 2);
    }
}
