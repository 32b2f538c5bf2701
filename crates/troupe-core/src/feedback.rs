//! Feedback — evaluates a completed plan and decides whether to iterate.
//!
//! Invoked exactly once per plan that runs to completion without a replan
//! signal. The verdict either terminates the run or feeds corrective text
//! into the next planning round. Strategies must not mutate the history;
//! test stubs are expected to be pure functions of the log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionClient, CompletionConfig};
use crate::error::TeamError;
use crate::history::ChatHistory;

/// Terminate/continue decision for one completed plan.
///
/// Wire format: `{"shouldTerminate": bool, "feedback": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackVerdict {
    #[serde(rename = "shouldTerminate")]
    pub terminate: bool,
    #[serde(default)]
    pub feedback: String,
}

impl FeedbackVerdict {
    pub fn terminate() -> Self {
        Self {
            terminate: true,
            feedback: String::new(),
        }
    }

    pub fn retry(feedback: impl Into<String>) -> Self {
        Self {
            terminate: false,
            feedback: feedback.into(),
        }
    }

    /// Parse a verdict from raw model output, tolerating code fences.
    pub fn parse(raw: &str) -> Result<Self, TeamError> {
        let cleaned = raw.trim().replace("```json", "").replace("```", "");
        serde_json::from_str(cleaned.trim())
            .map_err(|e| TeamError::Completion(format!("malformed feedback JSON: {}", e)))
    }
}

/// Strategy that reviews the history after a full plan executes.
#[async_trait]
pub trait FeedbackStrategy: Send + Sync {
    async fn provide_feedback(&self, history: &ChatHistory) -> Result<FeedbackVerdict, TeamError>;
}

const DEFAULT_CRITERIA: &str = "\
1. The work was successful. Set \"shouldTerminate\" to true and leave \"feedback\" empty.
2. The work failed. Set \"shouldTerminate\" to false and explain the issue.
3. The work was partially successful. Set \"shouldTerminate\" to false and explain the issue.";

/// Feedback strategy backed by a completion endpoint.
pub struct ModelFeedbackStrategy {
    client: std::sync::Arc<CompletionClient>,
    config: CompletionConfig,
    /// Review criteria injected into the feedback prompt.
    criteria: String,
}

impl ModelFeedbackStrategy {
    pub fn new(client: std::sync::Arc<CompletionClient>, config: CompletionConfig) -> Self {
        Self {
            client,
            config,
            criteria: DEFAULT_CRITERIA.to_string(),
        }
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = criteria.into();
        self
    }

    fn build_prompt(&self, history: &ChatHistory) -> String {
        let transcript = history
            .iter()
            .map(|m| format!("{} ({}): {}", m.sender, m.role.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You must review the output of the team below and provide feedback.\n\
The feedback MUST be a JSON object with the following structure:\n\n\
{{\n    \"shouldTerminate\": true,\n    \"feedback\": \"feedback\"\n}}\n\n\
The feedback must be based on the following criteria:\n{criteria}\n\n\
# TEAM OUTPUT\n{transcript}\n",
            criteria = self.criteria,
            transcript = transcript,
        )
    }
}

#[async_trait]
impl FeedbackStrategy for ModelFeedbackStrategy {
    async fn provide_feedback(&self, history: &ChatHistory) -> Result<FeedbackVerdict, TeamError> {
        let prompt = self.build_prompt(history);
        let raw = self.client.complete_prompt(&self.config, &prompt).await?;
        let verdict = FeedbackVerdict::parse(&raw)?;

        tracing::info!(
            "[Feedback] terminate={} feedback={:?}",
            verdict.terminate,
            verdict.feedback
        );

        Ok(verdict)
    }
}
