//! Case/identity provider — an external collaborator.
//!
//! The orchestrator only needs one lookup: who the two parties for a case
//! are, and whether a professional has been assigned yet.

use async_trait::async_trait;
use casecall_protocol::CaseParticipants;

#[async_trait]
pub trait CaseDirectory: Send + Sync {
    async fn participants(&self, case_id: &str) -> anyhow::Result<CaseParticipants>;
}
