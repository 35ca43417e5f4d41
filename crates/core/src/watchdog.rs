//! Liveness watchdog — attached only while a session is `active`.
//!
//! Does three things for its party: consumes a runtime-agnostic stream of
//! liveness signals (the host UI forwards its visibility/unload
//! notifications as `LivenessSignal`s), emits a periodic liveness
//! heartbeat through the store, and polls the session row plus the
//! counterpart's heartbeat. It reports, never writes terminal states:
//! alerts go back to the orchestrator, which runs the same teardown paths
//! the end-call button uses.
//!
//! A `Hidden` signal arms a grace deadline; `Visible` disarms it. Brief
//! app-switching therefore never drops the call, while a tab that stays
//! hidden past the grace period is treated as abandoned. `Closing` is the
//! best-effort "tab is going away now" signal and reports immediately.
//!
//! The heartbeat is what makes a kill with no signal recoverable: a
//! crashed counterpart's watchdog dies with it, so the surviving side
//! notices the counterpart's heartbeat going stale past the grace period
//! and reports the session as orphaned.
//!
//! Stopping aborts the task and drops the signal receiver, so repeated
//! attach/detach cycles never accumulate timers or listeners.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use casecall_protocol::CommunicationSession;

use crate::store::SessionStore;

/// Host-runtime liveness signal, abstracted from any particular
/// unload/visibility primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessSignal {
    Visible,
    Hidden,
    Closing,
}

/// What the watchdog tells the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAlert {
    /// The local participant is gone (tab closed, or hidden past grace).
    Abandoned,
    /// The counterpart's heartbeat went stale past the grace period: it
    /// vanished without any signal and the session is orphaned.
    CounterpartLost,
    /// The session row is already terminal; the counterpart (or a
    /// cleanup pass) ended it.
    RemoteEnded,
}

/// Handle to a running watchdog task.
pub struct Watchdog {
    session_id: String,
    task: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn spawn(
        session: &CommunicationSession,
        local_user: &str,
        store: Arc<dyn SessionStore>,
        signals: broadcast::Receiver<LivenessSignal>,
        alerts: mpsc::Sender<WatchdogAlert>,
        grace_period: Duration,
        poll_interval: Duration,
    ) -> Self {
        let session_id = session.id.clone();
        let task = tokio::spawn(run(
            session_id.clone(),
            local_user.to_string(),
            session.counterpart_of(local_user).to_string(),
            store,
            signals,
            alerts,
            grace_period,
            poll_interval,
        ));
        Self {
            session_id,
            task: Some(task),
        }
    }

    /// Idempotent: safe to call on every exit path.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(component = "watchdog", session_id = %self.session_id, "watchdog stopped");
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    session_id: String,
    local_user: String,
    counterpart: String,
    store: Arc<dyn SessionStore>,
    mut signals: broadcast::Receiver<LivenessSignal>,
    alerts: mpsc::Sender<WatchdogAlert>,
    grace_period: Duration,
    poll_interval: Duration,
) {
    let mut poll = tokio::time::interval(poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut grace_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            sig = signals.recv() => match sig {
                Ok(LivenessSignal::Visible) => {
                    if grace_deadline.take().is_some() {
                        debug!(component = "watchdog", session_id = %session_id, "visibility returned, grace disarmed");
                    }
                }
                Ok(LivenessSignal::Hidden) => {
                    if grace_deadline.is_none() {
                        grace_deadline = Some(Instant::now() + grace_period);
                        debug!(component = "watchdog", session_id = %session_id, "tab hidden, grace armed");
                    }
                }
                Ok(LivenessSignal::Closing) => {
                    debug!(component = "watchdog", session_id = %session_id, "tab closing");
                    let _ = alerts.send(WatchdogAlert::Abandoned).await;
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                // Signal source is gone; the orchestrator is shutting down.
                Err(broadcast::error::RecvError::Closed) => return,
            },

            _ = tokio::time::sleep_until(grace_deadline.unwrap_or_else(Instant::now)),
                if grace_deadline.is_some() =>
            {
                debug!(component = "watchdog", session_id = %session_id, "grace period elapsed");
                let _ = alerts.send(WatchdogAlert::Abandoned).await;
                return;
            }

            _ = poll.tick() => {
                if let Err(e) = store.record_heartbeat(&session_id, &local_user, Utc::now()).await {
                    warn!(
                        component = "watchdog",
                        session_id = %session_id,
                        error = %e,
                        "heartbeat write failed"
                    );
                }
                match store.get(&session_id).await {
                    Ok(Some(session)) if session.is_terminal() => {
                        let _ = alerts.send(WatchdogAlert::RemoteEnded).await;
                        return;
                    }
                    Ok(Some(session)) => {
                        match store.get_heartbeat(&session_id, &counterpart).await {
                            Ok(last_seen) => {
                                // Until the counterpart's first heartbeat
                                // lands, measure from activation.
                                let reference = last_seen
                                    .or(session.started_at)
                                    .unwrap_or(session.created_at);
                                let stale = (Utc::now() - reference)
                                    .to_std()
                                    .map(|age| age > grace_period)
                                    .unwrap_or(false);
                                if stale {
                                    warn!(
                                        component = "watchdog",
                                        session_id = %session_id,
                                        counterpart = %counterpart,
                                        "counterpart liveness signals stopped, session orphaned"
                                    );
                                    let _ = alerts.send(WatchdogAlert::CounterpartLost).await;
                                    return;
                                }
                            }
                            Err(e) => {
                                warn!(
                                    component = "watchdog",
                                    session_id = %session_id,
                                    error = %e,
                                    "heartbeat read failed"
                                );
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // Store unavailability is not abandonment; keep
                        // watching and let the next poll retry.
                        warn!(
                            component = "watchdog",
                            session_id = %session_id,
                            error = %e,
                            "liveness poll failed"
                        );
                    }
                }
            }
        }
    }
}
