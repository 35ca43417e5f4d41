//! Events crossing the orchestrator's boundaries.
//!
//! `ChangeEvent` is the store-change hint delivered by the notifier:
//! at-least-once, best-effort, no ordering guarantee. Consumers must treat
//! it as a wake-up hint and re-read the store, never as the sole source of
//! a transition.
//!
//! `SessionEvent` is the outward-facing surface for toast/analytics
//! consumers.

use serde::{Deserialize, Serialize};

use crate::types::{CommunicationSession, SessionType};

/// Row-level change kind broadcast by the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A store-change hint, scoped to the record's case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: CommunicationSession,
}

/// What the orchestrator tells its UI/notification consumers.
///
/// `Declined` and `Cancelled` both correspond to a `failed` record but
/// carry different copy: the initiator needs to know whether the
/// counterpart rejected the call versus the call self-cancelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The local user requested a session ("Calling…").
    Requested {
        session_id: String,
        session_type: SessionType,
    },
    /// A counterpart-initiated session appeared; render the ring/accept
    /// affordance.
    IncomingRing {
        session_id: String,
        session_type: SessionType,
        initiated_by: String,
    },
    /// The second party joined; both sides show "connected".
    Accepted { session_id: String },
    /// The counterpart rejected the outgoing call.
    Declined { session_id: String },
    /// The outgoing call was cancelled before anyone joined.
    Cancelled { session_id: String },
    /// The call terminated; duration is `None` when the session never
    /// connected or the final write was lost ("ended with warnings").
    Ended {
        session_id: String,
        duration_seconds: Option<i64>,
    },
    /// The call the user tried to join no longer exists. Rendered softly,
    /// never as a hard error.
    CallUnavailable { session_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommunicationSession;

    #[test]
    fn session_event_wire_shape_is_tagged_snake_case() {
        let ev = SessionEvent::Ended {
            session_id: "s-1".into(),
            duration_seconds: Some(42),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "ended");
        assert_eq!(json["duration_seconds"], 42);

        let ev = SessionEvent::IncomingRing {
            session_id: "s-2".into(),
            session_type: SessionType::Voice,
            initiated_by: "u-1".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "incoming_ring");
        assert_eq!(json["session_type"], "voice");
    }

    #[test]
    fn change_event_carries_the_full_record() {
        let session =
            CommunicationSession::new("case-9", SessionType::Chat, "u-a", "u-a", "u-b");
        let ev = ChangeEvent {
            kind: ChangeKind::Insert,
            record: session.clone(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "insert");
        assert_eq!(json["record"]["case_id"], "case-9");
        assert_eq!(json["record"]["status"], "scheduled");
    }
}
