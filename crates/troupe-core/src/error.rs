//! Core error type for the Troupe engine.
//!
//! `TeamError` is used throughout the engine (teams, strategies, stores).
//! The engine performs no local recovery: planning, worker and completion
//! failures all propagate to the run's caller unrecovered. Messages already
//! appended to the history before a failure stay there for diagnostic replay.

#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    /// The planning capability could not produce a well-formed plan.
    #[error("Plan generation failed: {0}")]
    PlanGeneration(String),

    /// A plan step or selection named a worker id absent from the roster.
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    /// A worker's `respond` call failed.
    #[error("Worker '{worker}' invocation failed: {message}")]
    WorkerInvocation { worker: String, message: String },

    /// The chat-completion endpoint returned an error or malformed payload.
    #[error("Completion request failed: {0}")]
    Completion(String),

    /// The planning/feedback loop exceeded its configured round cap.
    #[error("Round limit of {0} reached without a termination verdict")]
    RoundLimit(usize),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid team definition: {0}")]
    InvalidDefinition(String),

    /// A run finished without producing any message.
    #[error("No response from team")]
    NoResponse,
}
