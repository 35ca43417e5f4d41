//! Session orchestrator — the per-device state machine.
//!
//! One orchestrator per open case view, discarded on navigation; no
//! singleton. All state lives in a single spawned loop that reacts to
//! user commands, notifier hints, watchdog alerts, and client-local
//! timers in one `select!`. External callers hold an `Orchestrator`
//! handle: commands go over an mpsc channel with oneshot replies,
//! render state comes from a lock-free `ArcSwap` snapshot, and
//! toast/analytics consumers subscribe to a broadcast of `SessionEvent`s.
//!
//! The persisted session status is ground truth. Notifier deliveries are
//! wake-up hints only: every hint (and a periodic fallback tick, sized by
//! `decline_fallback`) re-fetches the case's sessions and re-derives
//! local state, so duplicate, missing, and out-of-order deliveries all
//! converge on the same result.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use casecall_protocol::{CommunicationSession, SessionEvent, SessionStatus, SessionType};

use crate::cleanup::EmergencyCleanup;
use crate::config::OrchestratorConfig;
use crate::directory::CaseDirectory;
use crate::error::{OrchestratorError, StoreError};
use crate::notifier::ChangeNotifier;
use crate::recording::RecordingLifecycleAdapter;
use crate::store::SessionStore;
use crate::transition::{failure_notice, transition, Effect, Input, Notice, Role};
use crate::watchdog::{LivenessSignal, Watchdog, WatchdogAlert};

const EVENT_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 32;
const LIVENESS_CAPACITY: usize = 16;

/// What the UI should render right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    /// Outgoing request, waiting for the counterpart ("Calling…").
    Calling,
    /// Incoming request, ring/accept affordance shown.
    Ringing,
    Connected,
}

/// Lock-free render snapshot: the case's current non-terminal session and
/// the local phase.
#[derive(Debug, Clone)]
pub struct CallView {
    pub phase: CallPhase,
    pub session: Option<CommunicationSession>,
}

impl CallView {
    fn idle() -> Self {
        Self {
            phase: CallPhase::Idle,
            session: None,
        }
    }
}

/// Result of `join_as_callee`. Losing the join race is an expected
/// outcome, not an error.
#[derive(Debug)]
pub enum JoinOutcome {
    Joined(CommunicationSession),
    /// The session reached a terminal state first (e.g. the caller
    /// cancelled as we clicked accept). Render "call no longer
    /// available".
    Unavailable,
}

enum Command {
    Request {
        session_type: SessionType,
        reply: oneshot::Sender<Result<CommunicationSession, OrchestratorError>>,
    },
    Join {
        reply: oneshot::Sender<Result<JoinOutcome, OrchestratorError>>,
    },
    Decline {
        reply: oneshot::Sender<Result<(), OrchestratorError>>,
    },
    Cancel {
        reply: oneshot::Sender<Result<(), OrchestratorError>>,
    },
    End {
        reply: oneshot::Sender<Result<(), OrchestratorError>>,
    },
    Shutdown,
}

/// Handle to a running orchestrator (cheap to clone).
#[derive(Clone)]
pub struct Orchestrator {
    case_id: String,
    command_tx: mpsc::Sender<Command>,
    view: Arc<ArcSwap<CallView>>,
    events: broadcast::Sender<SessionEvent>,
    liveness: broadcast::Sender<LivenessSignal>,
}

impl Orchestrator {
    /// Spawn the orchestrator loop for one case view.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        case_id: impl Into<String>,
        local_user: impl Into<String>,
        config: OrchestratorConfig,
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn ChangeNotifier>,
        directory: Arc<dyn CaseDirectory>,
        cleanup: Arc<dyn EmergencyCleanup>,
        recording: Arc<RecordingLifecycleAdapter>,
    ) -> Self {
        let case_id = case_id.into();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (liveness, _) = broadcast::channel(LIVENESS_CAPACITY);
        let view = Arc::new(ArcSwap::from_pointee(CallView::idle()));
        let (alert_tx, alert_rx) = mpsc::channel(8);

        let core = Core {
            case_id: case_id.clone(),
            local_user: local_user.into(),
            config,
            store,
            directory,
            cleanup,
            recording,
            events: events.clone(),
            liveness: liveness.clone(),
            view: view.clone(),
            phase: Phase::Idle,
            watchdog: None,
            ring_deadline: None,
            alert_tx,
        };
        let subscription = notifier.subscribe(&case_id);
        tokio::spawn(core.run(command_rx, subscription, alert_rx));

        Self {
            case_id,
            command_tx,
            view,
            events,
            liveness,
        }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Current render snapshot (lock-free).
    pub fn view(&self) -> Arc<CallView> {
        self.view.load_full()
    }

    /// The case's current non-terminal session, if any.
    pub fn current_session(&self) -> Option<CommunicationSession> {
        self.view.load().session.clone()
    }

    /// Subscribe to consumer-facing session events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Forward a host-runtime liveness signal (visibility change, unload).
    /// Consumed by the watchdog while a session is active; harmless
    /// otherwise.
    pub fn notify_liveness(&self, signal: LivenessSignal) {
        let _ = self.liveness.send(signal);
    }

    /// Request a new session for this case.
    pub async fn request_session(
        &self,
        session_type: SessionType,
    ) -> Result<CommunicationSession, OrchestratorError> {
        self.roundtrip(|reply| Command::Request {
            session_type,
            reply,
        })
        .await?
    }

    /// Accept the incoming call.
    pub async fn join_as_callee(&self) -> Result<JoinOutcome, OrchestratorError> {
        self.roundtrip(|reply| Command::Join { reply }).await?
    }

    /// Reject the incoming call.
    pub async fn decline(&self) -> Result<(), OrchestratorError> {
        self.roundtrip(|reply| Command::Decline { reply }).await?
    }

    /// Withdraw the outgoing request. Local waiting state clears even if
    /// the write fails.
    pub async fn cancel(&self) -> Result<(), OrchestratorError> {
        self.roundtrip(|reply| Command::Cancel { reply }).await?
    }

    /// End the active call. Idempotent: with no call in progress this is
    /// a no-op, never an error.
    pub async fn end(&self) -> Result<(), OrchestratorError> {
        self.roundtrip(|reply| Command::End { reply }).await?
    }

    /// Tear the loop down (case view navigated away).
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }

    async fn roundtrip<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(make(tx))
            .await
            .map_err(|_| OrchestratorError::ShutDown)?;
        rx.await.map_err(|_| OrchestratorError::ShutDown)
    }
}

/// Local machine state. The session carried here is the last fetched
/// copy; the phase (not the copy's status field) is what transitions run
/// against.
enum Phase {
    Idle,
    Waiting { session: CommunicationSession },
    Ringing { session: CommunicationSession },
    Connected { session: CommunicationSession, role: Role },
}

enum DriveOutcome {
    Applied,
    RaceLost,
    NoOp,
    WriteFailed(StoreError),
}

struct Core {
    case_id: String,
    local_user: String,
    config: OrchestratorConfig,
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn CaseDirectory>,
    cleanup: Arc<dyn EmergencyCleanup>,
    recording: Arc<RecordingLifecycleAdapter>,
    events: broadcast::Sender<SessionEvent>,
    liveness: broadcast::Sender<LivenessSignal>,
    view: Arc<ArcSwap<CallView>>,
    phase: Phase,
    watchdog: Option<Watchdog>,
    ring_deadline: Option<Instant>,
    alert_tx: mpsc::Sender<WatchdogAlert>,
}

impl Core {
    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut subscription: crate::notifier::Subscription,
        mut alert_rx: mpsc::Receiver<WatchdogAlert>,
    ) {
        // Fallback reconciliation: a terminal state whose notification was
        // missed is picked up within one decline_fallback window.
        let mut fallback = tokio::time::interval(self.config.decline_fallback);
        fallback.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut hints_open = true;

        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                hint = subscription.recv(), if hints_open => match hint {
                    Some(_) => self.reconcile().await,
                    None => {
                        // Notifier gone: fall back to polling only.
                        warn!(component = "orchestrator", case_id = %self.case_id,
                              "change notifier closed, relying on fallback polling");
                        hints_open = false;
                    }
                },

                Some(alert) = alert_rx.recv() => self.handle_alert(alert).await,

                _ = tokio::time::sleep_until(self.ring_deadline.unwrap_or_else(Instant::now)),
                    if self.ring_deadline.is_some() =>
                {
                    self.ring_deadline = None;
                    self.drive(Input::RingTimeout, None).await;
                }

                _ = fallback.tick() => self.reconcile().await,
            }
        }

        self.stop_watchdog();
        debug!(component = "orchestrator", case_id = %self.case_id, "orchestrator loop exited");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Request {
                session_type,
                reply,
            } => {
                let _ = reply.send(self.handle_request(session_type).await);
            }
            Command::Join { reply } => {
                let _ = reply.send(self.handle_join().await);
            }
            Command::Decline { reply } => {
                let _ = reply.send(self.handle_decline().await);
            }
            Command::Cancel { reply } => {
                let _ = reply.send(self.handle_cancel().await);
            }
            Command::End { reply } => {
                let _ = reply.send(self.handle_end().await);
            }
            Command::Shutdown => unreachable!("handled in run"),
        }
    }

    async fn handle_request(
        &mut self,
        session_type: SessionType,
    ) -> Result<CommunicationSession, OrchestratorError> {
        if !matches!(self.phase, Phase::Idle) {
            return Err(OrchestratorError::SessionAlreadyActive {
                case_id: self.case_id.clone(),
            });
        }

        let participants = self
            .directory
            .participants(&self.case_id)
            .await
            .map_err(|e| OrchestratorError::WriteFailed(StoreError::Backend(e)))?;
        let professional_id =
            participants
                .professional_id
                .ok_or_else(|| OrchestratorError::NoCounterpartAssigned {
                    case_id: self.case_id.clone(),
                })?;

        // Re-check the store before writing anything: the at-most-one
        // invariant is enforced here, client-side, pre-create.
        let sessions = self
            .store
            .list_by_case_id(&self.case_id)
            .await
            .map_err(OrchestratorError::WriteFailed)?;
        if sessions.iter().any(|s| !s.is_terminal()) {
            return Err(OrchestratorError::SessionAlreadyActive {
                case_id: self.case_id.clone(),
            });
        }

        let session = CommunicationSession::new(
            &self.case_id,
            session_type,
            &self.local_user,
            participants.client_id,
            professional_id,
        );
        self.store
            .insert(&session)
            .await
            .map_err(OrchestratorError::WriteFailed)?;

        info!(
            component = "orchestrator",
            case_id = %self.case_id,
            session_id = %session.id,
            session_type = session_type.as_str(),
            "session requested"
        );

        self.ring_deadline = Some(Instant::now() + self.config.ring_timeout);
        self.phase = Phase::Waiting {
            session: session.clone(),
        };
        self.publish_view();
        self.emit(SessionEvent::Requested {
            session_id: session.id.clone(),
            session_type,
        });
        Ok(session)
    }

    async fn handle_join(&mut self) -> Result<JoinOutcome, OrchestratorError> {
        if !matches!(self.phase, Phase::Ringing { .. }) {
            return Err(OrchestratorError::NotRinging);
        }
        match self.drive(Input::Accept, None).await {
            DriveOutcome::Applied => match &self.phase {
                Phase::Connected { session, .. } => Ok(JoinOutcome::Joined(session.clone())),
                // Commit left us elsewhere; treat as the race it is.
                _ => Ok(JoinOutcome::Unavailable),
            },
            DriveOutcome::RaceLost | DriveOutcome::NoOp => Ok(JoinOutcome::Unavailable),
            DriveOutcome::WriteFailed(e) => Err(OrchestratorError::WriteFailed(e)),
        }
    }

    async fn handle_decline(&mut self) -> Result<(), OrchestratorError> {
        if !matches!(self.phase, Phase::Ringing { .. }) {
            return Err(OrchestratorError::NotRinging);
        }
        match self.drive(Input::Decline, None).await {
            DriveOutcome::WriteFailed(e) => Err(OrchestratorError::WriteFailed(e)),
            _ => Ok(()),
        }
    }

    async fn handle_cancel(&mut self) -> Result<(), OrchestratorError> {
        if !matches!(self.phase, Phase::Waiting { .. }) {
            return Err(OrchestratorError::NotWaiting);
        }
        match self.drive(Input::Cancel, None).await {
            DriveOutcome::WriteFailed(e) => Err(OrchestratorError::WriteFailed(e)),
            _ => Ok(()),
        }
    }

    async fn handle_end(&mut self) -> Result<(), OrchestratorError> {
        match self.phase {
            Phase::Connected { .. } => {}
            // Idempotent: a second hangup (or a hangup after the
            // counterpart already ended) is a quiet no-op.
            Phase::Idle => return Ok(()),
            _ => return Err(OrchestratorError::NotInCall),
        }
        self.drive(Input::HangUp, None).await;
        // Local state has cleared unconditionally; the write, if it
        // failed, was escalated inside the drive.
        Ok(())
    }

    async fn handle_alert(&mut self, alert: WatchdogAlert) {
        if !matches!(self.phase, Phase::Connected { .. }) {
            return;
        }
        match alert {
            WatchdogAlert::Abandoned => {
                info!(component = "orchestrator", case_id = %self.case_id,
                      "watchdog reported abandonment, terminating session");
                self.drive(Input::Abandoned, None).await;
            }
            // The counterpart vanished with no signal; the surviving side
            // runs the same teardown it would for its own abandonment.
            WatchdogAlert::CounterpartLost => {
                info!(component = "orchestrator", case_id = %self.case_id,
                      "counterpart liveness stopped, terminating orphaned session");
                self.drive(Input::Abandoned, None).await;
            }
            WatchdogAlert::RemoteEnded => {
                let observed = self.refetch_tracked().await;
                self.drive(Input::TerminationObserved, observed).await;
            }
        }
    }

    /// Re-derive local state from the store. Safe to call at any time,
    /// from any wake-up source.
    async fn reconcile(&mut self) {
        let sessions = match self.store.list_by_case_id(&self.case_id).await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(component = "orchestrator", case_id = %self.case_id, error = %e,
                      "reconcile fetch failed");
                return;
            }
        };

        let tracked_id = self.tracked().map(|(s, _, _)| s.id);
        match tracked_id {
            None => {
                let Some(open) = sessions.iter().find(|s| !s.is_terminal()) else {
                    return;
                };
                match open.status {
                    SessionStatus::Scheduled if !open.initiated_locally(&self.local_user) => {
                        self.phase = Phase::Ringing {
                            session: open.clone(),
                        };
                        self.arm_ring_deadline(open);
                        self.publish_view();
                        self.emit(SessionEvent::IncomingRing {
                            session_id: open.id.clone(),
                            session_type: open.session_type,
                            initiated_by: open.initiated_by.clone(),
                        });
                    }
                    // Our own scheduled session, rediscovered (e.g. the
                    // view was re-created mid-ring).
                    SessionStatus::Scheduled => {
                        self.phase = Phase::Waiting {
                            session: open.clone(),
                        };
                        self.arm_ring_deadline(open);
                        self.publish_view();
                    }
                    // An active session we are party to: re-attach
                    // quietly. The recording claim is conflict-free, so
                    // re-running it is safe even when the other side (or a
                    // previous incarnation of this view) already holds it.
                    SessionStatus::Active => {
                        let role = if open.initiated_locally(&self.local_user) {
                            Role::Caller
                        } else {
                            Role::Callee
                        };
                        self.start_watchdog(open);
                        if self.config.recording_enabled {
                            self.recording.on_session_active(&open.id).await;
                        }
                        self.phase = Phase::Connected {
                            session: open.clone(),
                            role,
                        };
                        self.publish_view();
                    }
                    _ => {}
                }
            }

            Some(id) => {
                let Some(latest) = sessions.into_iter().find(|s| s.id == id) else {
                    return;
                };
                match latest.status {
                    SessionStatus::Scheduled => {}
                    SessionStatus::Active => {
                        self.drive(Input::ActivationObserved, Some(latest)).await;
                    }
                    SessionStatus::Failed => {
                        let reason = latest.failure_reason;
                        self.drive(Input::FailureObserved(reason), Some(latest)).await;
                    }
                    SessionStatus::Ended => {
                        self.drive(Input::TerminationObserved, Some(latest)).await;
                    }
                }
            }
        }
    }

    /// Apply one input through the pure transition function and execute
    /// its effects. `observed` refreshes the tracked copy before effects
    /// run (used when the input came from a store read).
    async fn drive(&mut self, input: Input, observed: Option<CommunicationSession>) -> DriveOutcome {
        let Some((session, status, role)) = self.tracked() else {
            return DriveOutcome::NoOp;
        };
        let (next_status, effects) = transition(status, role, input.clone());
        if effects.is_empty() {
            return DriveOutcome::NoOp;
        }

        let mut current = observed.unwrap_or(session);
        let mut suppress_notices = false;
        let mut write_error: Option<StoreError> = None;
        let now = Utc::now();

        for effect in effects {
            match effect {
                Effect::WriteActivate => match self.store.activate(&current.id, now).await {
                    Ok(Some(updated)) => current = updated,
                    Ok(None) => {
                        // The session went terminal first: never enter an
                        // active UI state for it.
                        debug!(component = "orchestrator", session_id = %current.id,
                               "lost the join race");
                        self.clear_call();
                        self.emit(SessionEvent::CallUnavailable {
                            session_id: current.id.clone(),
                        });
                        return DriveOutcome::RaceLost;
                    }
                    Err(e) => return DriveOutcome::WriteFailed(e),
                },

                Effect::WriteFail(reason) => {
                    let mut result = self.store.fail(&current.id, reason, now).await;
                    if result.is_err() {
                        // One silent retry for non-critical writes.
                        result = self.store.fail(&current.id, reason, now).await;
                    }
                    match result {
                        Ok(Some(updated)) => current = updated,
                        Ok(None) => {
                            // Already left `scheduled` another way; our
                            // notice would be wrong. Re-read the row and
                            // surface what actually happened instead.
                            suppress_notices = true;
                            if input == Input::Cancel {
                                // The callee joined as we cancelled; the
                                // caller still wants out.
                                let _ = self.store.end(&current.id, now).await;
                            }
                            if let Ok(Some(latest)) = self.store.get(&current.id).await {
                                match latest.status {
                                    SessionStatus::Failed => {
                                        self.emit_notice(
                                            failure_notice(role, latest.failure_reason),
                                            &latest,
                                        );
                                    }
                                    SessionStatus::Ended => {
                                        self.emit_notice(Notice::Ended, &latest);
                                    }
                                    _ => {}
                                }
                                current = latest;
                            }
                        }
                        Err(e) => {
                            // Local state still clears below.
                            warn!(component = "orchestrator", session_id = %current.id,
                                  error = %e, "failure write lost after retry");
                            write_error = Some(e);
                        }
                    }
                }

                Effect::WriteEnd => match self.store.end(&current.id, now).await {
                    Ok(Some(updated)) => current = updated,
                    Ok(None) => {} // already ended: idempotent no-op
                    Err(e) => {
                        // Two-phase teardown: escalate to the privileged
                        // cleanup path. Local state clears regardless of
                        // its outcome.
                        warn!(component = "orchestrator", session_id = %current.id,
                              error = %e, "termination write failed, escalating");
                        if let Err(e) = self.cleanup.force_end_session(&current.id).await {
                            warn!(component = "orchestrator", session_id = %current.id,
                                  error = %e, "emergency cleanup failed, ending with warnings");
                        }
                        if let Ok(Some(latest)) = self.store.get(&current.id).await {
                            current = latest;
                        }
                    }
                },

                Effect::StartWatchdog => self.start_watchdog(&current),
                Effect::StopWatchdog => self.stop_watchdog(),
                Effect::StartRecording => {
                    if self.config.recording_enabled {
                        self.recording.on_session_active(&current.id).await;
                    }
                }
                Effect::StopRecording => {
                    if self.config.recording_enabled {
                        self.recording.on_session_terminated(&current.id).await;
                    }
                }
                Effect::Emit(notice) => {
                    if !suppress_notices {
                        self.emit_notice(notice, &current);
                    }
                }
            }
        }

        // Commit the phase.
        if next_status.is_terminal() {
            self.clear_call();
        } else if next_status == SessionStatus::Active {
            self.ring_deadline = None;
            self.phase = Phase::Connected {
                session: current,
                role,
            };
            self.publish_view();
        }

        match write_error {
            Some(e) => DriveOutcome::WriteFailed(e),
            None => DriveOutcome::Applied,
        }
    }

    fn tracked(&self) -> Option<(CommunicationSession, SessionStatus, Role)> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Waiting { session } => {
                Some((session.clone(), SessionStatus::Scheduled, Role::Caller))
            }
            Phase::Ringing { session } => {
                Some((session.clone(), SessionStatus::Scheduled, Role::Callee))
            }
            Phase::Connected { session, role } => {
                Some((session.clone(), SessionStatus::Active, *role))
            }
        }
    }

    async fn refetch_tracked(&self) -> Option<CommunicationSession> {
        let (session, _, _) = self.tracked()?;
        self.store.get(&session.id).await.ok().flatten()
    }

    /// Clear every piece of local call state. Always safe; this is the
    /// "the user's screen must never be stuck in a call state" rule.
    fn clear_call(&mut self) {
        self.stop_watchdog();
        self.ring_deadline = None;
        self.phase = Phase::Idle;
        self.publish_view();
    }

    fn start_watchdog(&mut self, session: &CommunicationSession) {
        if self.watchdog.is_some() {
            return; // never double-start
        }
        self.watchdog = Some(Watchdog::spawn(
            session,
            &self.local_user,
            self.store.clone(),
            self.liveness.subscribe(),
            self.alert_tx.clone(),
            self.config.grace_period,
            self.config.liveness_poll_interval,
        ));
    }

    fn stop_watchdog(&mut self) {
        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
    }

    /// Both clients enforce the ring timeout from the record's own
    /// `created_at`, so they converge even when one observes the session
    /// late.
    fn arm_ring_deadline(&mut self, session: &CommunicationSession) {
        let elapsed = (Utc::now() - session.created_at)
            .to_std()
            .unwrap_or_default();
        let remaining = self.config.ring_timeout.saturating_sub(elapsed);
        self.ring_deadline = Some(Instant::now() + remaining);
    }

    fn publish_view(&self) {
        let view = match &self.phase {
            Phase::Idle => CallView::idle(),
            Phase::Waiting { session } => CallView {
                phase: CallPhase::Calling,
                session: Some(session.clone()),
            },
            Phase::Ringing { session } => CallView {
                phase: CallPhase::Ringing,
                session: Some(session.clone()),
            },
            Phase::Connected { session, .. } => CallView {
                phase: CallPhase::Connected,
                session: Some(session.clone()),
            },
        };
        self.view.store(Arc::new(view));
    }

    fn emit_notice(&self, notice: Notice, session: &CommunicationSession) {
        let session_id = session.id.clone();
        let event = match notice {
            Notice::Accepted => SessionEvent::Accepted { session_id },
            Notice::Declined => SessionEvent::Declined { session_id },
            Notice::Cancelled => SessionEvent::Cancelled { session_id },
            Notice::Ended => SessionEvent::Ended {
                session_id,
                duration_seconds: session.duration_seconds,
            },
            Notice::Unavailable => SessionEvent::CallUnavailable { session_id },
        };
        self.emit(event);
    }

    fn emit(&self, event: SessionEvent) {
        // Send fails only with no subscribers; events are best-effort.
        let _ = self.events.send(event);
    }
}
