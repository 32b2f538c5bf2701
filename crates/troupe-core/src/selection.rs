//! Speaker election and termination — the conversational-mode strategies.
//!
//! In conversational mode the team asks a `SelectionStrategy` for the next
//! speaker each turn, then a `TerminationStrategy` whether to pause and
//! hand control back to the external caller. The stop-set convention marks
//! certain workers (typically a human proxy) as "awaiting external input":
//! their turn still executes and is recorded before the loop halts.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::completion::{CompletionClient, CompletionConfig};
use crate::error::TeamError;
use crate::history::ChatHistory;
use crate::worker::Roster;

/// Elects exactly one roster worker to speak next.
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    async fn select(&self, roster: &Roster, history: &ChatHistory) -> Result<String, TeamError>;
}

/// Decides, after each turn, whether the loop should pause for external
/// input.
pub trait TerminationStrategy: Send + Sync {
    fn should_pause(&self, worker_id: &str, history: &ChatHistory) -> bool;
}

/// Deterministic rotation: the worker after the previous speaker, starting
/// from the first roster member.
#[derive(Default)]
pub struct RoundRobinSelection;

#[async_trait]
impl SelectionStrategy for RoundRobinSelection {
    async fn select(&self, roster: &Roster, history: &ChatHistory) -> Result<String, TeamError> {
        if roster.is_empty() {
            return Err(TeamError::UnknownWorker("(empty roster)".to_string()));
        }

        let ids: Vec<&str> = roster.iter().map(|w| w.id()).collect();

        // Last roster member that spoke; external/user messages don't
        // advance the rotation.
        let last_speaker = history
            .iter()
            .rev()
            .find_map(|m| ids.iter().position(|id| *id == m.sender));

        let next = match last_speaker {
            Some(pos) => (pos + 1) % ids.len(),
            None => 0,
        };

        Ok(ids[next].to_string())
    }
}

/// Completion-backed elector: shows the roster and recent transcript, asks
/// for a single worker id.
pub struct ModelSelectionStrategy {
    client: std::sync::Arc<CompletionClient>,
    config: CompletionConfig,
}

impl ModelSelectionStrategy {
    pub fn new(client: std::sync::Arc<CompletionClient>, config: CompletionConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, roster: &Roster, history: &ChatHistory) -> String {
        let transcript = history
            .iter()
            .rev()
            .take(10)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|m| format!("{}: {}", m.sender, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are moderating a conversation between the workers below. \
Based on the transcript, pick the single worker that should speak next.\n\n\
Respond with ONLY the worker_id. DO NOT return anything else.\n\n\
# AVAILABLE WORKERS\n{workers}\n\n\
# TRANSCRIPT\n{transcript}\n",
            workers = roster.render_info(),
            transcript = transcript,
        )
    }
}

#[async_trait]
impl SelectionStrategy for ModelSelectionStrategy {
    async fn select(&self, roster: &Roster, history: &ChatHistory) -> Result<String, TeamError> {
        let prompt = self.build_prompt(roster, history);
        let raw = self.client.complete_prompt(&self.config, &prompt).await?;
        let id = raw.trim().trim_matches('"').to_string();

        if !roster.contains(&id) {
            return Err(TeamError::UnknownWorker(id));
        }

        tracing::debug!("[Selection] Elected next speaker: {}", id);
        Ok(id)
    }
}

/// Pauses when the just-selected worker belongs to the configured stop set.
pub struct StopSet {
    ids: HashSet<String>,
}

impl StopSet {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl TerminationStrategy for StopSet {
    fn should_pause(&self, worker_id: &str, _history: &ChatHistory) -> bool {
        self.ids.contains(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::history::Message;
    use crate::worker::{Worker, WorkerDescriptor};

    struct Stub(WorkerDescriptor);

    #[async_trait]
    impl Worker for Stub {
        fn descriptor(&self) -> &WorkerDescriptor {
            &self.0
        }

        async fn respond(&self, _history: &ChatHistory) -> Result<Vec<Message>, TeamError> {
            Ok(Vec::new())
        }
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Arc::new(Stub(WorkerDescriptor::new("greeter", "Greeter", ""))) as Arc<dyn Worker>,
            Arc::new(Stub(WorkerDescriptor::new("pricer", "Pricer", ""))),
            Arc::new(Stub(WorkerDescriptor::new("user_proxy", "User", ""))),
        ])
    }

    #[tokio::test]
    async fn test_round_robin_starts_at_first_worker() {
        let history = ChatHistory::new();
        let id = RoundRobinSelection.select(&roster(), &history).await.unwrap();
        assert_eq!(id, "greeter");
    }

    #[tokio::test]
    async fn test_round_robin_rotates_and_wraps() {
        let roster = roster();
        let mut history = ChatHistory::new();
        history.push(Message::user("caller", "hi"));
        history.push(Message::assistant("greeter", "hello"));

        let id = RoundRobinSelection.select(&roster, &history).await.unwrap();
        assert_eq!(id, "pricer");

        history.push(Message::assistant("user_proxy", "PAUSE"));
        let id = RoundRobinSelection.select(&roster, &history).await.unwrap();
        assert_eq!(id, "greeter");
    }

    #[test]
    fn test_stop_set() {
        let stop = StopSet::new(["user_proxy"]);
        let history = ChatHistory::new();
        assert!(stop.should_pause("user_proxy", &history));
        assert!(!stop.should_pause("greeter", &history));
    }
}
