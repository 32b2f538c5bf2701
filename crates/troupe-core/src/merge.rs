//! Fork/merge — reconciles an isolated sub-run back into its parent log.
//!
//! The delta is computed by fork-point position, not content diffing: a
//! fork starts as a value copy of the parent, so everything past the
//! parent's length is net-new. The parent is never mutated here; the
//! caller appends the returned delta.

use crate::history::Message;

/// Messages appended to `forked` after the fork point.
pub fn merge_delta(parent: &[Message], forked: &[Message]) -> Vec<Message> {
    if forked.len() <= parent.len() {
        return Vec::new();
    }
    forked[parent.len()..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ChatHistory, Message};

    #[test]
    fn test_delta_is_only_net_new_messages() {
        let mut parent = ChatHistory::new();
        parent.push(Message::user("caller", "order"));

        let mut fork = parent.fork();
        fork.push(Message::assistant("team", "validate"));
        fork.push(Message::assistant("validator", "ok"));

        let delta = merge_delta(parent.messages(), fork.messages());
        assert_eq!(delta.len(), 2);
        assert_eq!(delta[0].sender, "team");
        assert_eq!(delta[1].sender, "validator");
    }

    #[test]
    fn test_round_trip_append_delta_equals_fork() {
        let mut parent = ChatHistory::new();
        parent.push(Message::user("caller", "order"));
        parent.push(Message::system("host", "context"));

        let mut fork = parent.fork();
        fork.push(Message::assistant("worker", "done"));

        let delta = merge_delta(parent.messages(), fork.messages());
        for m in delta {
            parent.push(m);
        }
        assert_eq!(parent, fork);
    }

    #[test]
    fn test_unchanged_fork_yields_empty_delta() {
        let mut parent = ChatHistory::new();
        parent.push(Message::user("caller", "order"));
        let fork = parent.fork();
        assert!(merge_delta(parent.messages(), fork.messages()).is_empty());
    }
}
