//! Conversational mode — turn-by-turn speaker election.
//!
//! State machine per run:
//!
//! ```text
//! SELECT_SPEAKER → INVOKE → APPEND → {STOP_FOR_INPUT | SELECT_SPEAKER}
//! ```
//!
//! The loop halts when the termination strategy pauses on the just-selected
//! worker (the stop-set convention: that worker's turn still executes and
//! is recorded first). Messages carrying `ControlSignal::Pause` stay in the
//! log but are excluded from the emitted output, so the interruption
//! convention never pollutes user-facing output.

use std::sync::Arc;

use futures::stream::BoxStream;
use tokio_stream::StreamExt;

use crate::channel::HistoryChannel;
use crate::error::TeamError;
use crate::history::{ChatHistory, ControlSignal, Message};
use crate::selection::{SelectionStrategy, TerminationStrategy};
use crate::worker::Roster;

const DEFAULT_MAX_TURNS: usize = 64;

/// A team of workers holding an open-ended, turn-taking conversation.
pub struct ChatTeam {
    pub id: String,
    pub description: String,
    roster: Roster,
    selection: Arc<dyn SelectionStrategy>,
    termination: Arc<dyn TerminationStrategy>,
    /// Cap on turns per invocation; exceeding it fails the run.
    max_turns: usize,
}

impl ChatTeam {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        roster: Roster,
        selection: Arc<dyn SelectionStrategy>,
        termination: Arc<dyn TerminationStrategy>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            roster,
            selection,
            termination,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Run the election loop until the termination strategy pauses,
    /// streaming each turn's visible messages as they are produced.
    pub fn invoke<'a>(
        &'a self,
        history: &'a mut ChatHistory,
    ) -> BoxStream<'a, Result<Message, TeamError>> {
        Box::pin(async_stream::try_stream! {
            let mut channel = HistoryChannel::new();
            channel.receive(history.messages());

            let mut turn = 0usize;

            loop {
                if turn >= self.max_turns {
                    Err(TeamError::RoundLimit(self.max_turns))?;
                }
                turn += 1;

                let speaker_id = self.selection.select(&self.roster, history).await?;
                let worker = self.roster.get(&speaker_id)?;

                tracing::debug!(
                    "[ChatTeam:{}] Turn {} speaker: {}",
                    self.id,
                    turn,
                    speaker_id
                );

                let produced: Vec<(bool, Message)> = channel
                    .invoke(worker.as_ref(), history)
                    .collect::<Result<Vec<_>, _>>()
                    .await?;

                for (is_visible, message) in produced {
                    let control = message.control;
                    history.push(message.clone());

                    if is_visible && control != Some(ControlSignal::Pause) {
                        yield message;
                    }
                }

                if self.termination.should_pause(&speaker_id, history) {
                    tracing::debug!(
                        "[ChatTeam:{}] Pausing for external input after {}",
                        self.id,
                        speaker_id
                    );
                    break;
                }
            }
        })
    }
}
