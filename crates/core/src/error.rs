//! Error taxonomy for the orchestrator.
//!
//! Three families, with different handling policies:
//! - precondition failures (`NoCounterpartAssigned`, `SessionAlreadyActive`)
//!   are reported to the user immediately, no retry;
//! - `WriteFailed` is retried once silently for non-critical writes and
//!   escalated to the emergency-cleanup path for termination writes;
//! - a lost join race is not an error at all: it is recovered silently and
//!   surfaced as `JoinOutcome::Unavailable`.

use thiserror::Error;

/// Failure from the persistent store or another collaborator backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error")]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The case has no professional assigned; there is nobody to call.
    #[error("case {case_id} has no counterpart assigned")]
    NoCounterpartAssigned { case_id: String },

    /// A non-terminal session already exists for the case.
    #[error("case {case_id} already has a session in progress")]
    SessionAlreadyActive { case_id: String },

    /// A store write failed after any applicable retry/escalation.
    #[error("session write failed")]
    WriteFailed(#[source] StoreError),

    /// `join_as_callee`/`decline` called with no incoming ring.
    #[error("no incoming session to answer")]
    NotRinging,

    /// `cancel` called with no outgoing request waiting.
    #[error("no outgoing request to cancel")]
    NotWaiting,

    /// `end` called outside an active call.
    #[error("no active call to end")]
    NotInCall,

    /// The orchestrator loop has shut down (case view was discarded).
    #[error("orchestrator is shut down")]
    ShutDown,
}
