//! YAML schema types for team definitions.
//!
//! A team YAML declares the roster, the completion endpoint, and the
//! orchestration mode:
//!
//! ```yaml
//! id: "order-processing"
//! description: "Handles customer order inquiries end to end"
//! mode: planned        # planned | chat
//!
//! completion:
//!   base_url: "${ANTHROPIC_BASE_URL:-https://api.anthropic.com}"
//!   api_key: "${ANTHROPIC_API_KEY}"
//!   model: "claude-sonnet-4-20250514"
//!   temperature: 0.0
//!
//! workers:
//!   - id: validator
//!     name: "Order Validator"
//!     description: "Checks SKUs and quantities against the catalog"
//!     system_prompt: "You validate orders..."
//!     capabilities:
//!       - check_sku
//!       - check_quantity
//!   - id: pricer
//!     name: "Pricer"
//!     description: "Computes totals and applies discounts"
//!     system_prompt: "You price orders..."
//!
//! planner:
//!   guidelines: |
//!     1. Always validate before pricing.
//!
//! feedback:
//!   criteria: |
//!     The order must be validated and priced.
//!
//! fork_history: false
//! max_rounds: 16
//! ```
//!
//! For `mode: chat` the `chat` block replaces `planner`/`feedback`:
//!
//! ```yaml
//! chat:
//!   selection: round_robin   # round_robin | model
//!   stop_after:
//!     - user_proxy
//!   max_turns: 64
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::completion::{resolve_env_vars, CompletionClient, CompletionConfig};
use crate::error::TeamError;
use crate::feedback::ModelFeedbackStrategy;
use crate::planning::ModelPlanningStrategy;
use crate::selection::{ModelSelectionStrategy, RoundRobinSelection, SelectionStrategy, StopSet};
use crate::team::{ChatTeam, PlannedTeam};
use crate::worker::{ModelWorker, Roster, Worker, WorkerDescriptor};

/// Top-level team definition loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDefinition {
    /// Team id; directive messages in the log are attributed to it
    pub id: String,

    /// Optional description
    #[serde(default)]
    pub description: String,

    /// Orchestration mode
    #[serde(default)]
    pub mode: TeamMode,

    /// Completion endpoint shared by workers and strategies
    /// (string fields support `${ENV_VAR}` references)
    #[serde(default)]
    pub completion: CompletionSettings,

    /// Roster members, in rotation order
    pub workers: Vec<WorkerDefinition>,

    /// Planned mode: planner overrides
    #[serde(default)]
    pub planner: Option<PlannerSettings>,

    /// Planned mode: feedback overrides
    #[serde(default)]
    pub feedback: Option<FeedbackSettings>,

    /// Planned mode: run against a forked history, emit only the delta
    #[serde(default)]
    pub fork_history: bool,

    /// Planned mode: cap on planning rounds
    #[serde(default)]
    pub max_rounds: Option<usize>,

    /// Chat mode settings
    #[serde(default)]
    pub chat: Option<ChatSettings>,
}

/// Orchestration mode: "planned" or "chat".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamMode {
    #[default]
    Planned,
    Chat,
}

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionSettings {
    /// Base URL (defaults to the Anthropic API)
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key (supports `${ENV_VAR}` references)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model ID
    #[serde(default)]
    pub model: Option<String>,

    /// Temperature for generation
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl CompletionSettings {
    /// Resolve into a concrete config, expanding `${ENV_VAR}` references
    /// and falling back to defaults for missing fields.
    pub fn resolve(&self) -> CompletionConfig {
        let defaults = CompletionConfig::default();
        CompletionConfig {
            base_url: self
                .base_url
                .as_deref()
                .map(resolve_env_vars)
                .unwrap_or(defaults.base_url),
            api_key: self
                .api_key
                .as_deref()
                .map(resolve_env_vars)
                .unwrap_or(defaults.api_key),
            model: self.model.clone().unwrap_or(defaults.model),
            temperature: self.temperature,
            system_prompt: String::new(),
        }
    }
}

/// One roster member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerDefinition {
    /// Unique within the roster
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Shown to the planner/elector when choosing workers
    pub description: String,

    /// System prompt for the backing model
    #[serde(default)]
    pub system_prompt: String,

    /// Capability labels shown to the planner
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Planner overrides for planned mode.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlannerSettings {
    /// Workflow conventions injected into the planning prompt
    #[serde(default)]
    pub guidelines: Option<String>,
}

/// Feedback overrides for planned mode.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeedbackSettings {
    /// Completion criteria injected into the feedback prompt
    #[serde(default)]
    pub criteria: Option<String>,
}

/// Chat mode settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatSettings {
    /// Speaker election: "round_robin" or "model"
    #[serde(default)]
    pub selection: SelectionKind,

    /// Worker ids after whose turn the loop pauses for external input
    #[serde(default)]
    pub stop_after: Vec<String>,

    /// Cap on turns per invocation
    #[serde(default)]
    pub max_turns: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    #[default]
    RoundRobin,
    Model,
}

impl TeamDefinition {
    /// Parse a team definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, TeamError> {
        let def: Self = serde_yaml::from_str(yaml)
            .map_err(|e| TeamError::InvalidDefinition(format!("Failed to parse team YAML: {}", e)))?;
        def.validate()?;
        Ok(def)
    }

    /// Load a team definition from a file path.
    pub fn from_file(path: &str) -> Result<Self, TeamError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TeamError::InvalidDefinition(format!("Failed to read team file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), TeamError> {
        if self.workers.is_empty() {
            return Err(TeamError::InvalidDefinition(
                "team has no workers".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for worker in &self.workers {
            if !seen.insert(worker.id.as_str()) {
                return Err(TeamError::InvalidDefinition(format!(
                    "duplicate worker id '{}'",
                    worker.id
                )));
            }
        }

        if let Some(chat) = &self.chat {
            for id in &chat.stop_after {
                if !self.workers.iter().any(|w| &w.id == id) {
                    return Err(TeamError::InvalidDefinition(format!(
                        "stop_after references unknown worker '{}'",
                        id
                    )));
                }
            }
        }

        if self.mode == TeamMode::Chat && self.chat.is_none() {
            return Err(TeamError::InvalidDefinition(
                "mode is 'chat' but no chat block is defined".to_string(),
            ));
        }

        Ok(())
    }

    fn build_roster(&self, client: &Arc<CompletionClient>) -> Roster {
        let base = self.completion.resolve();
        let workers: Vec<Arc<dyn Worker>> = self
            .workers
            .iter()
            .map(|w| {
                let descriptor = WorkerDescriptor::new(
                    w.id.clone(),
                    w.name.clone().unwrap_or_else(|| w.id.clone()),
                    w.description.clone(),
                )
                .with_capabilities(w.capabilities.clone());
                let config = base.clone().with_system_prompt(w.system_prompt.clone());
                Arc::new(ModelWorker::new(descriptor, Arc::clone(client), config))
                    as Arc<dyn Worker>
            })
            .collect();
        Roster::new(workers)
    }

    /// Assemble a planned team from this definition.
    pub fn build_planned(&self, client: Arc<CompletionClient>) -> Result<PlannedTeam, TeamError> {
        if self.mode != TeamMode::Planned {
            return Err(TeamError::InvalidDefinition(format!(
                "team '{}' is not in planned mode",
                self.id
            )));
        }

        let roster = self.build_roster(&client);
        let config = self.completion.resolve();

        let mut planning = ModelPlanningStrategy::new(Arc::clone(&client), config.clone());
        if let Some(guidelines) = self.planner.as_ref().and_then(|p| p.guidelines.clone()) {
            planning = planning.with_guidelines(guidelines);
        }

        let mut feedback = ModelFeedbackStrategy::new(Arc::clone(&client), config);
        if let Some(criteria) = self.feedback.as_ref().and_then(|f| f.criteria.clone()) {
            feedback = feedback.with_criteria(criteria);
        }

        let mut team = PlannedTeam::new(
            self.id.clone(),
            self.description.clone(),
            roster,
            Arc::new(planning),
            Arc::new(feedback),
        )
        .with_fork_history(self.fork_history);

        if let Some(max_rounds) = self.max_rounds {
            team = team.with_max_rounds(max_rounds);
        }

        tracing::info!("[Schema] Built planned team: {}", self.id);
        Ok(team)
    }

    /// Assemble a chat team from this definition.
    pub fn build_chat(&self, client: Arc<CompletionClient>) -> Result<ChatTeam, TeamError> {
        if self.mode != TeamMode::Chat {
            return Err(TeamError::InvalidDefinition(format!(
                "team '{}' is not in chat mode",
                self.id
            )));
        }

        let chat = self.chat.as_ref().ok_or_else(|| {
            TeamError::InvalidDefinition("mode is 'chat' but no chat block is defined".to_string())
        })?;

        let roster = self.build_roster(&client);
        let config = self.completion.resolve();

        let selection: Arc<dyn SelectionStrategy> = match chat.selection {
            SelectionKind::RoundRobin => Arc::new(RoundRobinSelection),
            SelectionKind::Model => Arc::new(ModelSelectionStrategy::new(client, config)),
        };

        let termination = Arc::new(StopSet::new(chat.stop_after.iter().cloned()));

        let mut team = ChatTeam::new(
            self.id.clone(),
            self.description.clone(),
            roster,
            selection,
            termination,
        );

        if let Some(max_turns) = chat.max_turns {
            team = team.with_max_turns(max_turns);
        }

        tracing::info!("[Schema] Built chat team: {}", self.id);
        Ok(team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_planned_team() {
        let yaml = r#"
id: "orders"
workers:
  - id: validator
    description: "Checks orders"
"#;
        let def = TeamDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.id, "orders");
        assert_eq!(def.mode, TeamMode::Planned);
        assert_eq!(def.workers.len(), 1);
        assert!(!def.fork_history);

        let team = def.build_planned(Arc::new(CompletionClient::new())).unwrap();
        assert_eq!(team.id, "orders");
        assert_eq!(team.roster().len(), 1);
    }

    #[test]
    fn test_parse_full_planned_team() {
        let yaml = r#"
id: "order-processing"
description: "Handles customer order inquiries"
mode: planned
completion:
  base_url: "https://open.bigmodel.cn/api/anthropic"
  model: "GLM-4.7"
  temperature: 0.0
workers:
  - id: validator
    name: "Order Validator"
    description: "Checks SKUs and quantities"
    system_prompt: "You validate orders."
    capabilities:
      - check_sku
  - id: pricer
    description: "Computes totals"
    system_prompt: "You price orders."
planner:
  guidelines: "1. Always validate before pricing."
feedback:
  criteria: "The order must be validated and priced."
fork_history: true
max_rounds: 8
"#;
        let def = TeamDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.mode, TeamMode::Planned);
        assert!(def.fork_history);
        assert_eq!(def.max_rounds, Some(8));
        assert_eq!(def.workers[0].capabilities, vec!["check_sku"]);

        let config = def.completion.resolve();
        assert_eq!(config.base_url, "https://open.bigmodel.cn/api/anthropic");
        assert_eq!(config.model, "GLM-4.7");
        assert_eq!(config.temperature, Some(0.0));
    }

    #[test]
    fn test_parse_chat_team() {
        let yaml = r#"
id: "support-chat"
mode: chat
workers:
  - id: agent
    description: "Answers questions"
  - id: user_proxy
    description: "Relays the human user"
chat:
  selection: round_robin
  stop_after:
    - user_proxy
  max_turns: 10
"#;
        let def = TeamDefinition::from_yaml(yaml).unwrap();
        assert_eq!(def.mode, TeamMode::Chat);

        let team = def.build_chat(Arc::new(CompletionClient::new())).unwrap();
        assert_eq!(team.id, "support-chat");
        assert_eq!(team.roster().len(), 2);
    }

    #[test]
    fn test_duplicate_worker_id_rejected() {
        let yaml = r#"
id: "orders"
workers:
  - id: validator
    description: "a"
  - id: validator
    description: "b"
"#;
        let err = TeamDefinition::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TeamError::InvalidDefinition(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_chat_mode_requires_chat_block() {
        let yaml = r#"
id: "orders"
mode: chat
workers:
  - id: agent
    description: "a"
"#;
        assert!(TeamDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_stop_after_must_reference_roster() {
        let yaml = r#"
id: "orders"
mode: chat
workers:
  - id: agent
    description: "a"
chat:
  stop_after:
    - ghost
"#;
        let err = TeamDefinition::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TeamError::InvalidDefinition(msg) if msg.contains("ghost")));
    }

    #[test]
    fn test_mode_mismatch_on_build() {
        let yaml = r#"
id: "orders"
workers:
  - id: validator
    description: "Checks orders"
"#;
        let def = TeamDefinition::from_yaml(yaml).unwrap();
        assert!(def.build_chat(Arc::new(CompletionClient::new())).is_err());
    }
}
