//! Core types shared across the orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of session the participants are in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Video,
    Voice,
    Chat,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Video => "video",
            SessionType::Voice => "voice",
            SessionType::Chat => "chat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" => Some(SessionType::Video),
            "voice" => Some(SessionType::Voice),
            "chat" => Some(SessionType::Chat),
            _ => None,
        }
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Ended,
    Failed,
}

impl SessionStatus {
    /// Terminal states absorb every further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(SessionStatus::Scheduled),
            "active" => Some(SessionStatus::Active),
            "ended" => Some(SessionStatus::Ended),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// Why a session ended up `failed`. Stored alongside the status so a
/// participant that missed the live notification can still render the
/// right copy ("declined" vs "cancelled") after a re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Cancelled,
    Declined,
    TimedOut,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Cancelled => "cancelled",
            FailureReason::Declined => "declined",
            FailureReason::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cancelled" => Some(FailureReason::Cancelled),
            "declined" => Some(FailureReason::Declined),
            "timed_out" => Some(FailureReason::TimedOut),
            _ => None,
        }
    }
}

/// One signaling record representing a single call/chat attempt tied
/// to a case. Never deleted; terminal rows remain for history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationSession {
    pub id: String,
    pub case_id: String,
    pub session_type: SessionType,
    pub initiated_by: String,
    pub client_id: String,
    pub professional_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, on the `scheduled -> active` transition, by the
    /// accepting party. This is what distinguishes "ringing" from
    /// "connected".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

impl CommunicationSession {
    /// Build a fresh `scheduled` session for a case.
    pub fn new(
        case_id: impl Into<String>,
        session_type: SessionType,
        initiated_by: impl Into<String>,
        client_id: impl Into<String>,
        professional_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.into(),
            session_type,
            initiated_by: initiated_by.into(),
            client_id: client_id.into(),
            professional_id: professional_id.into(),
            status: SessionStatus::Scheduled,
            failure_reason: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            duration_seconds: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Did the given participant create this session?
    pub fn initiated_locally(&self, user_id: &str) -> bool {
        self.initiated_by == user_id
    }

    /// The other party, from the given participant's point of view.
    pub fn counterpart_of(&self, user_id: &str) -> &str {
        if self.client_id == user_id {
            &self.professional_id
        } else {
            &self.client_id
        }
    }
}

/// Recording lifecycle status, driven by the external media collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Processing,
    Completed,
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Processing => "processing",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(RecordingStatus::Processing),
            "completed" => Some(RecordingStatus::Completed),
            "failed" => Some(RecordingStatus::Failed),
            _ => None,
        }
    }
}

/// A recording artifact for one session. At most one per session; created
/// when the session goes active with recording enabled, finalized
/// asynchronously by the media collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub session_id: String,
    pub status: RecordingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Recording {
    /// A placeholder row claimed at session activation, before the media
    /// collaborator has assigned its own identifier.
    pub fn processing(session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            status: RecordingStatus::Processing,
            media_url: None,
            duration_seconds: None,
            size_bytes: None,
            created_at: Utc::now(),
        }
    }
}

/// Changes to apply to a recording (delta updates)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,
}

/// The two parties eligible to join sessions for a case. A case may not
/// have a professional assigned yet, in which case no session can be
/// requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseParticipants {
    pub client_id: String,
    pub professional_id: Option<String>,
}
