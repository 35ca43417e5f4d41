//! casecall — communication session orchestrator.
//!
//! Lets the two parties of a case (client and assigned professional)
//! establish, join, monitor, and terminate a live video/voice/chat
//! session, with an at-most-one-active-session-per-case guarantee,
//! caller-cancel/callee-decline semantics, and resilient cleanup when a
//! participant disappears without signaling.
//!
//! The pieces, leaves first: a durable [`store`] (single source of
//! truth), a best-effort [`notifier`] of store changes, the per-device
//! [`orchestrator`] state machine, the [`watchdog`] that cleans up
//! abandoned active sessions, and the [`recording`] lifecycle adapter.

pub mod cleanup;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod orchestrator;
pub mod recording;
pub mod store;
pub mod transition;
pub mod watchdog;

pub use cleanup::{EmergencyCleanup, StoreEmergencyCleanup};
pub use config::OrchestratorConfig;
pub use directory::CaseDirectory;
pub use error::{OrchestratorError, StoreError};
pub use notifier::{ChangeNotifier, InProcessNotifier, Subscription};
pub use orchestrator::{CallPhase, CallView, JoinOutcome, Orchestrator};
pub use recording::{RecordingBackend, RecordingLifecycleAdapter};
pub use store::{SessionStore, SqliteSessionStore};
pub use watchdog::{LivenessSignal, Watchdog, WatchdogAlert};
