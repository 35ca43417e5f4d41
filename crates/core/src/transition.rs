//! Pure session state transition function
//!
//! All business logic for session state changes lives here as a pure,
//! synchronous function: `transition(status, role, input) -> (status,
//! effects)`. No IO, no async, no locking — fully unit-testable.
//!
//! The orchestrator feeds it both local user actions and store-observed
//! changes, and executes the returned effects (store writes, watchdog
//! start/stop, recording start/stop, consumer events). Terminal states
//! absorb every input with no effects: that single rule is what makes
//! duplicate notifier deliveries, out-of-order observation, and
//! double-hangups safe.

use casecall_protocol::{FailureReason, SessionStatus};

/// Which side of the call this device is on, for the session currently
/// being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiated the session; waiting for the counterpart.
    Caller,
    /// Observed an incoming `scheduled` session.
    Callee,
}

/// One step of the machine: a local action, a timer, or an observed store
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Local callee accepted the incoming call.
    Accept,
    /// The store shows the session went `active` (counterpart joined, or a
    /// duplicate delivery of our own join).
    ActivationObserved,
    /// Local caller cancelled while waiting.
    Cancel,
    /// Local callee declined the incoming call.
    Decline,
    /// The store shows the session `failed`. Reason is `None` when the
    /// record carries no failure reason (e.g. force-cleaned).
    FailureObserved(Option<FailureReason>),
    /// The client-local ring timer elapsed with nobody joining.
    RingTimeout,
    /// Local user ended the active call.
    HangUp,
    /// The watchdog decided the session was abandoned.
    Abandoned,
    /// The store shows the session `ended` (counterpart hung up, or a
    /// privileged cleanup ran).
    TerminationObserved,
}

/// What the orchestrator must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Guarded `scheduled -> active` write (sets `started_at` once).
    WriteActivate,
    /// Guarded `scheduled -> failed` write with the given reason.
    WriteFail(FailureReason),
    /// Termination write (two-phase: normal, then emergency fallback).
    WriteEnd,
    StartWatchdog,
    StopWatchdog,
    StartRecording,
    StopRecording,
    Emit(Notice),
}

/// Consumer-facing outcome of a transition. The orchestrator materializes
/// these into full `SessionEvent`s with session ids and durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Accepted,
    Declined,
    Cancelled,
    Ended,
    Unavailable,
}

/// Apply one input to the session's tracked status.
pub fn transition(status: SessionStatus, role: Role, input: Input) -> (SessionStatus, Vec<Effect>) {
    use Effect::*;
    use SessionStatus::*;

    // Terminal states absorb everything.
    if status.is_terminal() {
        return (status, Vec::new());
    }

    match (status, input) {
        // -- scheduled: ringing phase --
        (Scheduled, Input::Accept) => (
            Active,
            vec![WriteActivate, StartWatchdog, StartRecording, Emit(Notice::Accepted)],
        ),
        (Scheduled, Input::ActivationObserved) => (
            Active,
            vec![StartWatchdog, StartRecording, Emit(Notice::Accepted)],
        ),
        (Scheduled, Input::Cancel) => (
            Failed,
            vec![WriteFail(FailureReason::Cancelled), Emit(Notice::Cancelled)],
        ),
        // The callee's own UI just closes the ring; the caller learns of
        // the decline through the store.
        (Scheduled, Input::Decline) => (Failed, vec![WriteFail(FailureReason::Declined)]),
        (Scheduled, Input::FailureObserved(reason)) => {
            (Failed, vec![Emit(failure_notice(role, reason))])
        }
        // Both clients enforce the timeout independently; the store write
        // is guarded, so whichever fires first wins and the other is a
        // no-op at the store layer.
        (Scheduled, Input::RingTimeout) => {
            let notice = match role {
                Role::Caller => Notice::Declined,
                Role::Callee => Notice::Unavailable,
            };
            (Failed, vec![WriteFail(FailureReason::TimedOut), Emit(notice)])
        }
        // A privileged cleanup ended a session that never connected.
        (Scheduled, Input::TerminationObserved) => (Ended, vec![Emit(Notice::Ended)]),

        // -- active: connected phase --
        (Active, Input::HangUp) | (Active, Input::Abandoned) => (
            Ended,
            vec![WriteEnd, StopWatchdog, StopRecording, Emit(Notice::Ended)],
        ),
        (Active, Input::TerminationObserved) => (
            Ended,
            vec![StopWatchdog, StopRecording, Emit(Notice::Ended)],
        ),
        // Duplicate delivery of the activation we already applied: no
        // second watchdog, no second recording.
        (Active, Input::ActivationObserved) => (Active, Vec::new()),

        // Everything else is stale input for the current phase.
        (status, _) => (status, Vec::new()),
    }
}

/// Map an observed failure to the copy the *other* party should see.
pub(crate) fn failure_notice(role: Role, reason: Option<FailureReason>) -> Notice {
    match (role, reason) {
        // Caller's outgoing request was rejected (or rang out, which the
        // caller is shown the same way).
        (Role::Caller, Some(FailureReason::Declined)) => Notice::Declined,
        (Role::Caller, Some(FailureReason::TimedOut)) => Notice::Declined,
        // The counterpart withdrew the call before we answered.
        (Role::Callee, Some(FailureReason::Cancelled)) => Notice::Cancelled,
        // Our own write, observed back, or a reason that makes no sense
        // for our side: the ring simply goes away.
        (_, Some(_)) => Notice::Unavailable,
        // No recorded reason: degrade to a generic "call ended".
        (_, None) => Notice::Ended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_activates_and_starts_watchdog_and_recording() {
        let (status, effects) = transition(SessionStatus::Scheduled, Role::Callee, Input::Accept);

        assert_eq!(status, SessionStatus::Active);
        assert_eq!(
            effects,
            vec![
                Effect::WriteActivate,
                Effect::StartWatchdog,
                Effect::StartRecording,
                Effect::Emit(Notice::Accepted),
            ]
        );
    }

    #[test]
    fn caller_observing_activation_skips_the_write() {
        let (status, effects) =
            transition(SessionStatus::Scheduled, Role::Caller, Input::ActivationObserved);

        assert_eq!(status, SessionStatus::Active);
        assert!(!effects.contains(&Effect::WriteActivate));
        assert!(effects.contains(&Effect::StartWatchdog));
    }

    #[test]
    fn duplicate_activation_is_a_no_op() {
        let (status, effects) =
            transition(SessionStatus::Active, Role::Callee, Input::ActivationObserved);

        assert_eq!(status, SessionStatus::Active);
        assert!(effects.is_empty(), "no double-started watchdog or recording");
    }

    #[test]
    fn cancel_fails_with_cancelled_reason() {
        let (status, effects) = transition(SessionStatus::Scheduled, Role::Caller, Input::Cancel);

        assert_eq!(status, SessionStatus::Failed);
        assert_eq!(
            effects,
            vec![
                Effect::WriteFail(FailureReason::Cancelled),
                Effect::Emit(Notice::Cancelled),
            ]
        );
    }

    #[test]
    fn decline_writes_but_emits_nothing_locally() {
        let (status, effects) = transition(SessionStatus::Scheduled, Role::Callee, Input::Decline);

        assert_eq!(status, SessionStatus::Failed);
        assert_eq!(effects, vec![Effect::WriteFail(FailureReason::Declined)]);
    }

    #[test]
    fn caller_sees_declined_not_cancelled() {
        let (_, effects) = transition(
            SessionStatus::Scheduled,
            Role::Caller,
            Input::FailureObserved(Some(FailureReason::Declined)),
        );
        assert_eq!(effects, vec![Effect::Emit(Notice::Declined)]);
    }

    #[test]
    fn callee_sees_cancelled_when_caller_withdraws() {
        let (_, effects) = transition(
            SessionStatus::Scheduled,
            Role::Callee,
            Input::FailureObserved(Some(FailureReason::Cancelled)),
        );
        assert_eq!(effects, vec![Effect::Emit(Notice::Cancelled)]);
    }

    #[test]
    fn missing_failure_reason_degrades_to_generic_ended() {
        let (_, effects) = transition(
            SessionStatus::Scheduled,
            Role::Caller,
            Input::FailureObserved(None),
        );
        assert_eq!(effects, vec![Effect::Emit(Notice::Ended)]);
    }

    #[test]
    fn ring_timeout_reads_as_declined_for_the_caller() {
        let (status, effects) =
            transition(SessionStatus::Scheduled, Role::Caller, Input::RingTimeout);

        assert_eq!(status, SessionStatus::Failed);
        assert_eq!(
            effects,
            vec![
                Effect::WriteFail(FailureReason::TimedOut),
                Effect::Emit(Notice::Declined),
            ]
        );
    }

    #[test]
    fn ring_timeout_clears_the_callee_ring_quietly() {
        let (_, effects) = transition(SessionStatus::Scheduled, Role::Callee, Input::RingTimeout);
        assert!(effects.contains(&Effect::Emit(Notice::Unavailable)));
    }

    #[test]
    fn hangup_and_abandonment_produce_the_same_teardown() {
        for input in [Input::HangUp, Input::Abandoned] {
            let (status, effects) = transition(SessionStatus::Active, Role::Caller, input);
            assert_eq!(status, SessionStatus::Ended);
            assert_eq!(
                effects,
                vec![
                    Effect::WriteEnd,
                    Effect::StopWatchdog,
                    Effect::StopRecording,
                    Effect::Emit(Notice::Ended),
                ]
            );
        }
    }

    #[test]
    fn counterpart_termination_skips_the_write() {
        let (status, effects) =
            transition(SessionStatus::Active, Role::Callee, Input::TerminationObserved);

        assert_eq!(status, SessionStatus::Ended);
        assert!(!effects.contains(&Effect::WriteEnd));
        assert!(effects.contains(&Effect::StopWatchdog));
    }

    #[test]
    fn terminal_states_absorb_every_input() {
        for status in [SessionStatus::Ended, SessionStatus::Failed] {
            for input in [
                Input::Accept,
                Input::ActivationObserved,
                Input::Cancel,
                Input::Decline,
                Input::FailureObserved(Some(FailureReason::Declined)),
                Input::RingTimeout,
                Input::HangUp,
                Input::Abandoned,
                Input::TerminationObserved,
            ] {
                let (next, effects) = transition(status, Role::Caller, input.clone());
                assert_eq!(next, status, "terminal state changed on {input:?}");
                assert!(effects.is_empty(), "terminal state produced effects on {input:?}");
            }
        }
    }

    #[test]
    fn stale_ring_inputs_are_ignored_while_active() {
        for input in [Input::Accept, Input::Cancel, Input::Decline, Input::RingTimeout] {
            let (status, effects) = transition(SessionStatus::Active, Role::Callee, input);
            assert_eq!(status, SessionStatus::Active);
            assert!(effects.is_empty());
        }
    }
}
