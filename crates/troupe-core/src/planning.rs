//! Planning — produces the ordered execution plan for a team round.
//!
//! A plan is an ordered list of `(worker_id, instructions)` steps. The
//! engine executes steps strictly in order and enforces nothing else:
//! domain ordering rules ("validate first", "re-price after substitution")
//! live in the guidelines the planning strategy writes into its prompt and
//! in the per-step instructions, never in the execution loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionClient, CompletionConfig};
use crate::error::TeamError;
use crate::history::ChatHistory;
use crate::worker::Roster;

/// One step of a plan. `worker_id` must resolve against the roster the
/// plan was created for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub worker_id: String,
    pub instructions: String,
}

/// Ordered execution plan for one planning round.
///
/// Wire format: `{"plan": [{"workerId": "...", "instructions": "..."}]}`.
/// An empty plan is legal and goes straight to feedback evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "plan", default)]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Parse a plan from raw model output, tolerating Markdown code fences.
    pub fn parse(raw: &str) -> Result<Self, TeamError> {
        let cleaned = raw.trim().replace("```json", "").replace("```", "");
        serde_json::from_str(cleaned.trim())
            .map_err(|e| TeamError::PlanGeneration(format!("malformed plan JSON: {}", e)))
    }

    /// Every step must reference a roster member; a violation is fatal.
    pub fn validate(&self, roster: &Roster) -> Result<(), TeamError> {
        for step in &self.steps {
            if !roster.contains(&step.worker_id) {
                return Err(TeamError::UnknownWorker(step.worker_id.clone()));
            }
        }
        Ok(())
    }
}

/// Strategy that turns roster + history + feedback into a plan.
#[async_trait]
pub trait PlanningStrategy: Send + Sync {
    async fn create_plan(
        &self,
        roster: &Roster,
        history: &ChatHistory,
        feedback: &str,
    ) -> Result<Plan, TeamError>;
}

const DEFAULT_GUIDELINES: &str = "\
1. ANALYZE the inquiry thoroughly to understand all requirements.
2. SELECT only the necessary workers based on their specific capabilities.
3. SEQUENCE workers in the optimal order to handle dependencies.
4. PROVIDE detailed instructions for each worker, tailored to the scenario.
5. ADDRESS any feedback from previous execution attempts.
6. Do NOT include the same worker twice back-to-back in the sequence.";

/// Planning strategy backed by a completion endpoint with structured JSON
/// output.
pub struct ModelPlanningStrategy {
    client: std::sync::Arc<CompletionClient>,
    config: CompletionConfig,
    /// Workflow conventions injected into the planning prompt.
    guidelines: String,
}

impl ModelPlanningStrategy {
    pub fn new(client: std::sync::Arc<CompletionClient>, config: CompletionConfig) -> Self {
        Self {
            client,
            config,
            guidelines: DEFAULT_GUIDELINES.to_string(),
        }
    }

    pub fn with_guidelines(mut self, guidelines: impl Into<String>) -> Self {
        self.guidelines = guidelines.into();
        self
    }

    fn build_prompt(&self, roster: &Roster, history: &ChatHistory, feedback: &str) -> String {
        let inquiry = history
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        format!(
            "You are a team orchestrator responsible for creating an execution plan \
over the available workers.\n\n\
# PLANNING GUIDELINES\n{guidelines}\n\n\
# FEEDBACK HANDLING\n\
When feedback is provided, a previous execution round failed. Analyze it, \
adjust the worker sequence or instructions, and include remediation steps.\n\n\
The plan must be returned as JSON, with the following structure:\n\n\
{{\n    \"plan\": [\n        {{\n            \"workerId\": \"worker_id\",\n            \
\"instructions\": \"instructions\"\n        }}\n    ]\n}}\n\n\
You MUST return the plan in the format specified above. DO NOT return anything else.\n\n\
# AVAILABLE WORKERS\n{workers}\n\n\
# INQUIRY\n{inquiry}\n\n\
# FEEDBACK\n{feedback}\n",
            guidelines = self.guidelines,
            workers = roster.render_info(),
            inquiry = inquiry,
            feedback = feedback,
        )
    }
}

#[async_trait]
impl PlanningStrategy for ModelPlanningStrategy {
    async fn create_plan(
        &self,
        roster: &Roster,
        history: &ChatHistory,
        feedback: &str,
    ) -> Result<Plan, TeamError> {
        if roster.is_empty() {
            return Err(TeamError::PlanGeneration("roster is empty".to_string()));
        }

        let prompt = self.build_prompt(roster, history, feedback);
        let raw = self.client.complete_prompt(&self.config, &prompt).await?;

        let plan = Plan::parse(&raw)?;
        plan.validate(roster)?;

        tracing::info!(
            "[Planning] Created plan with {} step(s): [{}]",
            plan.steps.len(),
            plan.steps
                .iter()
                .map(|s| s.worker_id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(plan)
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
            Arc::new(Stub(WorkerDescriptor::new("validator", "Validator", ""))) as Arc<dyn Worker>,
            Arc::new(Stub(WorkerDescriptor::new("pricer", "Pricer", ""))),
        ])
    }

    #[test]
    fn test_parse_plan_with_fences() {
        let raw = "```json\n{\"plan\": [{\"workerId\": \"validator\", \"instructions\": \"check\"}]}\n```";
        let plan = Plan::parse(raw).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].worker_id, "validator");
    }

    #[test]
    fn test_parse_empty_plan_is_legal() {
        let plan = Plan::parse("{\"plan\": []}").unwrap();
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn test_parse_malformed_plan_fails() {
        let err = Plan::parse("not json at all").unwrap_err();
        assert!(matches!(err, TeamError::PlanGeneration(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_worker() {
        let plan = Plan {
            steps: vec![PlanStep {
                worker_id: "ghost".to_string(),
                instructions: "boo".to_string(),
            }],
        };
        let err = plan.validate(&roster()).unwrap_err();
        assert!(matches!(err, TeamError::UnknownWorker(id) if id == "ghost"));
    }

    #[test]
    fn test_build_prompt_includes_roster_and_feedback() {
        let strategy = ModelPlanningStrategy::new(
            Arc::new(CompletionClient::new()),
            CompletionConfig::default(),
        );
        let mut history = ChatHistory::new();
        history.push(Message::user("caller", "process order 42"));

        let prompt = strategy.build_prompt(&roster(), &history, "pricing was wrong");
        assert!(prompt.contains("worker_id: validator"));
        assert!(prompt.contains("process order 42"));
        assert!(prompt.contains("pricing was wrong"));
    }
}
