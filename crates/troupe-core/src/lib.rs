//! Troupe Core — orchestration engine for teams of pluggable workers.
//!
//! A team drives a roster of workers over a shared, append-only
//! conversation log. Two control modes are provided:
//!
//! - [`PlannedTeam`] — plan, execute step by step, evaluate, iterate
//! - [`ChatTeam`] — turn-by-turn speaker election until a pause
//!
//! The crate has no HTTP framework dependency; hosts embed it directly
//! (see `troupe-cli`). All run state lives in the [`ChatHistory`] the
//! caller owns, so persistence is a load-modify-save concern of the host
//! via [`HistoryStore`].

pub mod channel;
pub mod completion;
pub mod error;
pub mod feedback;
pub mod history;
pub mod merge;
pub mod planning;
pub mod schema;
pub mod selection;
pub mod store;
pub mod team;
pub mod worker;

// Convenience re-exports
pub use completion::{CompletionClient, CompletionConfig};
pub use error::TeamError;
pub use feedback::{FeedbackStrategy, FeedbackVerdict, ModelFeedbackStrategy};
pub use history::{ChatHistory, ControlSignal, Message, Role};
pub use planning::{ModelPlanningStrategy, Plan, PlanStep, PlanningStrategy};
pub use schema::{TeamDefinition, TeamMode};
pub use selection::{
    ModelSelectionStrategy, RoundRobinSelection, SelectionStrategy, StopSet, TerminationStrategy,
};
pub use store::{Database, HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
pub use team::{ChatTeam, PlannedTeam};
pub use worker::{ModelWorker, Roster, Worker, WorkerDescriptor};
