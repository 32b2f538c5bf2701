//! Team orchestrators — the two control modes over a worker roster.
//!
//! [`PlannedTeam`] runs the batch planner/executor/feedback loop;
//! [`ChatTeam`] runs the turn-by-turn speaker-election loop. Both stream
//! messages as they are produced and operate on a caller-owned
//! `ChatHistory`, one invocation at a time: workers are awaited to
//! completion before the next append, so log order is deterministic.

mod chat;
mod planned;

pub use chat::ChatTeam;
pub use planned::PlannedTeam;
