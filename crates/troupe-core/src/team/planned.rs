//! Planned mode — plan, execute step by step, evaluate, iterate.
//!
//! State machine per run:
//!
//! ```text
//! PLANNING → EXECUTING_STEP → {CONTINUE | REPLAN_REQUESTED}
//!          → (all steps done) FEEDBACK_EVAL → {PLANNING | COMPLETE}
//! ```
//!
//! A structured `ControlSignal::Replan` on any produced message aborts the
//! remaining steps and jumps straight back to planning — feedback is not
//! evaluated for aborted passes, the abort itself is the control signal.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_stream::StreamExt;

use crate::channel::HistoryChannel;
use crate::error::TeamError;
use crate::feedback::FeedbackStrategy;
use crate::history::{ChatHistory, ControlSignal, Message};
use crate::merge::merge_delta;
use crate::planning::PlanningStrategy;
use crate::worker::Roster;

const DEFAULT_MAX_ROUNDS: usize = 16;

/// A team of workers that executes a plan in a coordinated manner.
pub struct PlannedTeam {
    /// Team id; directive messages in the log are attributed to it.
    pub id: String,
    pub description: String,
    roster: Roster,
    planning: Arc<dyn PlanningStrategy>,
    feedback: Arc<dyn FeedbackStrategy>,
    /// Run against a private fork and emit only the merge delta.
    fork_history: bool,
    /// Cap on planning rounds; exceeding it fails the run.
    max_rounds: usize,
}

impl PlannedTeam {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        roster: Roster,
        planning: Arc<dyn PlanningStrategy>,
        feedback: Arc<dyn FeedbackStrategy>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            roster,
            planning,
            feedback,
            fork_history: false,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_fork_history(mut self, fork_history: bool) -> Self {
        self.fork_history = fork_history;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Run the planner/executor/feedback loop, streaming messages as they
    /// are produced.
    ///
    /// Without history forking, worker messages are appended to `history`
    /// and emitted immediately, so everything produced before a failure
    /// stays in the caller's log. With forking, the run operates on a
    /// private copy and only the final merge delta is emitted; appending
    /// that delta is the caller's responsibility.
    pub fn invoke<'a>(
        &'a self,
        history: &'a mut ChatHistory,
    ) -> BoxStream<'a, Result<Message, TeamError>> {
        Box::pin(async_stream::try_stream! {
            let mut forked: Option<ChatHistory> = self.fork_history.then(|| history.fork());
            let working: &mut ChatHistory = match forked.as_mut() {
                Some(f) => f,
                None => &mut *history,
            };

            let mut channel = HistoryChannel::new();
            channel.receive(working.messages());

            let mut is_complete = false;
            let mut feedback_text = String::new();
            let mut round = 0usize;

            while !is_complete {
                if round >= self.max_rounds {
                    Err(TeamError::RoundLimit(self.max_rounds))?;
                }
                round += 1;

                let plan = self
                    .planning
                    .create_plan(&self.roster, working, &feedback_text)
                    .await?;
                plan.validate(&self.roster)?;

                tracing::debug!(
                    "[PlannedTeam:{}] Round {} executing {} step(s)",
                    self.id,
                    round,
                    plan.steps.len()
                );

                let mut must_replan = false;

                for step in &plan.steps {
                    let worker = self.roster.get(&step.worker_id)?;

                    // The directive must be in the log before the worker
                    // runs so it can see its own instructions.
                    working.push(Message::assistant(self.id.clone(), step.instructions.clone()));

                    let produced: Vec<(bool, Message)> = channel
                        .invoke(worker.as_ref(), working)
                        .collect::<Result<Vec<_>, _>>()
                        .await?;

                    for (is_visible, message) in produced {
                        let control = message.control;
                        working.push(message.clone());

                        if is_visible && !self.fork_history {
                            yield message;
                        }

                        if control == Some(ControlSignal::Replan) {
                            tracing::warn!(
                                "[PlannedTeam:{}] Worker {} asked to replan",
                                self.id,
                                step.worker_id
                            );
                            must_replan = true;
                            break;
                        }
                    }

                    if must_replan {
                        break;
                    }
                }

                if !must_replan {
                    let verdict = self.feedback.provide_feedback(working).await?;
                    is_complete = verdict.terminate;
                    feedback_text = verdict.feedback;
                }
            }

            if let Some(forked) = &forked {
                // The channel recorded the fork point when it received the
                // initial history.
                let fork_point = channel.initial_len();
                let delta = merge_delta(&forked.messages()[..fork_point], forked.messages());
                for message in delta {
                    yield message;
                }
            }
        })
    }

    /// Convenience: run to completion and return the first produced
    /// message, failing with `NoResponse` if the run emitted nothing.
    pub async fn get_response(&self, history: &mut ChatHistory) -> Result<Message, TeamError> {
        let mut first = None;
        {
            let mut stream = self.invoke(history);
            while let Some(item) = stream.next().await {
                let message = item?;
                if first.is_none() {
                    first = Some(message);
                }
            }
        }
        first.ok_or(TeamError::NoResponse)
    }
}
