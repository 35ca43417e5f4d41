//! Recording lifecycle adapter — thin bridge to the media collaborator.
//!
//! Starts recording on session activation and stops it on termination.
//! Only the first observer of the activation actually starts anything:
//! the claim goes through the store's conflict-free recording slot, so
//! both peers can race on `active` without double-recording. The
//! collaborator finalizes artifacts asynchronously; rows stay
//! `processing` in the interim and the orchestrator never blocks on them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use casecall_protocol::{Recording, RecordingPatch, RecordingStatus};

use crate::store::SessionStore;

/// The external media collaborator. Its only contract with this core is
/// "recording started/stopped for session X".
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// Begin recording; returns the collaborator's recording identifier.
    async fn start_recording(&self, session_id: &str) -> anyhow::Result<String>;

    async fn stop_recording(&self, session_id: &str) -> anyhow::Result<()>;
}

pub struct RecordingLifecycleAdapter {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn RecordingBackend>,
}

impl RecordingLifecycleAdapter {
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn RecordingBackend>) -> Self {
        Self { store, backend }
    }

    /// Called by each participant on the `active` transition. Whoever wins
    /// the store claim starts the backend and associates its recording id
    /// with the session; the loser does nothing.
    pub async fn on_session_active(&self, session_id: &str) {
        let placeholder = Recording::processing(session_id);
        let claimed = match self.store.claim_recording(&placeholder).await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(
                    component = "recording",
                    session_id,
                    error = %e,
                    "could not claim recording slot"
                );
                return;
            }
        };
        if !claimed {
            debug!(
                component = "recording",
                session_id, "recording already claimed by counterpart"
            );
            return;
        }

        match self.backend.start_recording(session_id).await {
            Ok(recording_id) => {
                info!(component = "recording", session_id, recording_id, "recording started");
                let patch = RecordingPatch {
                    id: Some(recording_id),
                    ..Default::default()
                };
                if let Err(e) = self.store.update_recording(session_id, patch).await {
                    warn!(
                        component = "recording",
                        session_id,
                        error = %e,
                        "failed to associate recording id"
                    );
                }
            }
            Err(e) => {
                warn!(
                    component = "recording",
                    session_id,
                    error = %e,
                    "backend failed to start recording"
                );
                let patch = RecordingPatch {
                    status: Some(RecordingStatus::Failed),
                    ..Default::default()
                };
                let _ = self.store.update_recording(session_id, patch).await;
            }
        }
    }

    /// Called on every termination path. Best-effort: the row stays
    /// `processing` until the collaborator finalizes it.
    pub async fn on_session_terminated(&self, session_id: &str) {
        match self.store.get_recording(session_id).await {
            Ok(Some(recording)) if recording.status == RecordingStatus::Processing => {
                if let Err(e) = self.backend.stop_recording(session_id).await {
                    warn!(
                        component = "recording",
                        session_id,
                        error = %e,
                        "backend failed to stop recording"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    component = "recording",
                    session_id,
                    error = %e,
                    "could not look up recording on termination"
                );
            }
        }
    }

    /// Entry point for the media collaborator once processing completes.
    pub async fn finalize(
        &self,
        session_id: &str,
        status: RecordingStatus,
        media_url: Option<String>,
        duration_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) -> anyhow::Result<()> {
        self.store
            .update_recording(
                session_id,
                RecordingPatch {
                    status: Some(status),
                    media_url,
                    duration_seconds,
                    size_bytes,
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::InProcessNotifier;
    use crate::store::SqliteSessionStore;
    use casecall_protocol::{CommunicationSession, SessionType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBackend {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    #[async_trait]
    impl RecordingBackend for CountingBackend {
        async fn start_recording(&self, _session_id: &str) -> anyhow::Result<String> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(format!("rec-{}", self.starts.load(Ordering::SeqCst)))
        }

        async fn stop_recording(&self, _session_id: &str) -> anyhow::Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn fixture() -> (
        Arc<dyn SessionStore>,
        Arc<CountingBackend>,
        RecordingLifecycleAdapter,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(InProcessNotifier::new());
        let store: Arc<dyn SessionStore> = Arc::new(
            SqliteSessionStore::open(dir.path().join("db"), notifier)
                .await
                .unwrap(),
        );
        let backend = Arc::new(CountingBackend::default());
        let adapter = RecordingLifecycleAdapter::new(store.clone(), backend.clone());
        (store, backend, adapter, dir)
    }

    #[tokio::test]
    async fn only_the_first_observer_starts_recording() {
        let (store, backend, adapter, _dir) = fixture().await;
        let session =
            CommunicationSession::new("case-1", SessionType::Video, "u-a", "u-a", "u-b");
        store.insert(&session).await.unwrap();

        // Both peers observe the activation.
        adapter.on_session_active(&session.id).await;
        adapter.on_session_active(&session.id).await;

        assert_eq!(backend.starts.load(Ordering::SeqCst), 1);
        let recording = store.get_recording(&session.id).await.unwrap().unwrap();
        assert_eq!(recording.id, "rec-1");
        assert_eq!(recording.status, RecordingStatus::Processing);
    }

    #[tokio::test]
    async fn termination_stops_processing_recordings_once() {
        let (store, backend, adapter, _dir) = fixture().await;
        let session =
            CommunicationSession::new("case-1", SessionType::Video, "u-a", "u-a", "u-b");
        store.insert(&session).await.unwrap();

        adapter.on_session_active(&session.id).await;
        adapter.on_session_terminated(&session.id).await;
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);

        // Finalized by the collaborator; a late stop does nothing.
        adapter
            .finalize(&session.id, RecordingStatus::Completed, None, Some(10), None)
            .await
            .unwrap();
        adapter.on_session_terminated(&session.id).await;
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn termination_without_a_recording_is_quiet() {
        let (_store, backend, adapter, _dir) = fixture().await;
        adapter.on_session_terminated("never-recorded").await;
        assert_eq!(backend.stops.load(Ordering::SeqCst), 0);
    }
}
