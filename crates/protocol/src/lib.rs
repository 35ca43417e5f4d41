//! Shared types for the casecall session orchestrator.
//!
//! Everything here is plain data: serde-serializable records and events
//! exchanged between the orchestrator core, its persistent store, and
//! UI/notification consumers. No I/O, no async.

mod events;
mod types;

pub use events::{ChangeEvent, ChangeKind, SessionEvent};
pub use types::{
    CaseParticipants, CommunicationSession, FailureReason, Recording, RecordingPatch,
    RecordingStatus, SessionStatus, SessionType,
};
