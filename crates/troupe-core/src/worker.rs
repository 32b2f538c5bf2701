//! Workers and the roster — the pluggable capability units a team drives.
//!
//! A worker is opaque to the engine: it receives the shared history and
//! asynchronously returns zero or more messages. All run state lives in the
//! history, never in the worker, so one worker instance is shared read-only
//! across runs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionClient, CompletionConfig};
use crate::error::TeamError;
use crate::history::{ChatHistory, Message};

/// Static identity of a roster member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerDescriptor {
    /// Unique within a roster.
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl WorkerDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// A task-executing capability unit.
#[async_trait]
pub trait Worker: Send + Sync {
    fn descriptor(&self) -> &WorkerDescriptor;

    /// Produce zero or more messages given the shared history.
    async fn respond(&self, history: &ChatHistory) -> Result<Vec<Message>, TeamError>;

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}

/// Ordered, immutable collection of workers, built once at startup.
#[derive(Clone, Default)]
pub struct Roster {
    workers: Vec<Arc<dyn Worker>>,
}

impl Roster {
    pub fn new(workers: Vec<Arc<dyn Worker>>) -> Self {
        Self { workers }
    }

    /// Resolve a worker by id. A miss is a contract violation by whoever
    /// produced the id (planner or elector), surfaced as `UnknownWorker`.
    pub fn get(&self, id: &str) -> Result<Arc<dyn Worker>, TeamError> {
        self.workers
            .iter()
            .find(|w| w.id() == id)
            .cloned()
            .ok_or_else(|| TeamError::UnknownWorker(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workers.iter().any(|w| w.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Worker>> {
        self.workers.iter()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Render roster info for planning/election prompts.
    pub fn render_info(&self) -> String {
        let mut info = Vec::new();
        for worker in &self.workers {
            let d = worker.descriptor();
            let mut entry = format!("- worker_id: {}\n    - description: {}", d.id, d.description);
            for cap in &d.capabilities {
                entry.push_str(&format!("\n    - capability: {}", cap));
            }
            info.push(entry);
        }
        info.join("\n\n")
    }
}

/// A worker backed by a chat-completion endpoint with a system prompt.
pub struct ModelWorker {
    descriptor: WorkerDescriptor,
    client: Arc<CompletionClient>,
    config: CompletionConfig,
}

impl ModelWorker {
    pub fn new(
        descriptor: WorkerDescriptor,
        client: Arc<CompletionClient>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            descriptor,
            client,
            config,
        }
    }
}

#[async_trait]
impl Worker for ModelWorker {
    fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    async fn respond(&self, history: &ChatHistory) -> Result<Vec<Message>, TeamError> {
        let content = self
            .client
            .complete(&self.config, history)
            .await
            .map_err(|e| TeamError::WorkerInvocation {
                worker: self.descriptor.id.clone(),
                message: e.to_string(),
            })?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Message::from_model_output(
            self.descriptor.id.clone(),
            content,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent(WorkerDescriptor);

    #[async_trait]
    impl Worker for Silent {
        fn descriptor(&self) -> &WorkerDescriptor {
            &self.0
        }

        async fn respond(&self, _history: &ChatHistory) -> Result<Vec<Message>, TeamError> {
            Ok(Vec::new())
        }
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Arc::new(Silent(WorkerDescriptor::new("validator", "Validator", "Checks orders"))),
            Arc::new(Silent(
                WorkerDescriptor::new("pricer", "Pricer", "Prices orders")
                    .with_capabilities(vec!["lookup_price".to_string()]),
            )),
        ])
    }

    #[test]
    fn test_roster_get_unknown_worker() {
        let roster = roster();
        assert!(roster.get("validator").is_ok());
        let err = roster.get("missing").err().unwrap();
        assert!(matches!(err, TeamError::UnknownWorker(id) if id == "missing"));
    }

    #[test]
    fn test_render_info_lists_capabilities() {
        let info = roster().render_info();
        assert!(info.contains("worker_id: validator"));
        assert!(info.contains("description: Prices orders"));
        assert!(info.contains("capability: lookup_price"));
    }
}
