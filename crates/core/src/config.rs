//! Tunables for the orchestrator and watchdog.

use std::time::Duration;

/// Timeout and policy knobs. Both participants' orchestrators enforce the
/// same values independently; there is no server-side timeout authority.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a `scheduled` session may ring before either client
    /// resolves it to `failed`.
    pub ring_timeout: Duration,

    /// How long an active session tolerates the tab being hidden before
    /// the watchdog treats it as abandoned. Long enough for brief
    /// app-switching, short enough to clean up truly dead sessions.
    pub grace_period: Duration,

    /// How often the watchdog re-reads the session row to notice a
    /// counterpart-side termination.
    pub liveness_poll_interval: Duration,

    /// How long to wait for a missed "declined" notification before
    /// degrading to a generic "call ended" message. Deployment policy,
    /// not a protocol constant.
    pub decline_fallback: Duration,

    /// Whether activation claims a recording for the session.
    pub recording_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(45),
            grace_period: Duration::from_secs(30),
            liveness_poll_interval: Duration::from_secs(5),
            decline_fallback: Duration::from_secs(10),
            recording_enabled: true,
        }
    }
}
