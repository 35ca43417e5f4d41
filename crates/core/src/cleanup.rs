//! Emergency cleanup — the privileged fallback termination path.
//!
//! Invoked only when the normal termination write fails. This is a
//! deliberate second mechanism, not exception handling: it must succeed
//! even when the normal path is entirely unreachable from the
//! participant's own context.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::store::SessionStore;

#[async_trait]
pub trait EmergencyCleanup: Send + Sync {
    /// Force the session to `ended`. Idempotent: repeated invocations for
    /// the same session must not error.
    async fn force_end_session(&self, session_id: &str) -> anyhow::Result<()>;
}

/// Cleanup backed by a store handle of its own — in a real deployment a
/// privileged (service-role) connection rather than the participant's.
pub struct StoreEmergencyCleanup {
    store: Arc<dyn SessionStore>,
}

impl StoreEmergencyCleanup {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EmergencyCleanup for StoreEmergencyCleanup {
    async fn force_end_session(&self, session_id: &str) -> anyhow::Result<()> {
        match self.store.end(session_id, Utc::now()).await {
            Ok(Some(_)) => {
                info!(
                    component = "cleanup",
                    session_id, "force-ended session via emergency path"
                );
                Ok(())
            }
            // Already ended (or never existed): nothing left to clean up.
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(
                    component = "cleanup",
                    session_id,
                    error = %e,
                    "emergency cleanup write failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::InProcessNotifier;
    use crate::store::SqliteSessionStore;
    use casecall_protocol::{CommunicationSession, SessionStatus, SessionType};

    #[tokio::test]
    async fn force_end_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(InProcessNotifier::new());
        let store: Arc<dyn SessionStore> = Arc::new(
            SqliteSessionStore::open(dir.path().join("db"), notifier)
                .await
                .unwrap(),
        );
        let cleanup = StoreEmergencyCleanup::new(store.clone());

        let session =
            CommunicationSession::new("case-1", SessionType::Voice, "u-a", "u-a", "u-b");
        store.insert(&session).await.unwrap();

        cleanup.force_end_session(&session.id).await.unwrap();
        cleanup.force_end_session(&session.id).await.unwrap();
        cleanup.force_end_session("no-such-session").await.unwrap();

        let got = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(got.status, SessionStatus::Ended);
    }
}
