//! Change notifier — best-effort pub/sub of row-level session changes.
//!
//! Delivery contract: at-least-once while subscribed, no ordering guarantee
//! across distinct change types, and events may be dropped under load.
//! Subscribers must treat deliveries as wake-up hints and re-read the store;
//! `Subscription::recv` therefore skips over lagged gaps instead of
//! surfacing them.

use casecall_protocol::ChangeEvent;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

/// Publish/subscribe channel for session changes, scoped per case.
pub trait ChangeNotifier: Send + Sync {
    /// Subscribe to changes for one case. Unsubscribing is dropping the
    /// returned handle.
    fn subscribe(&self, case_id: &str) -> Subscription;

    /// Broadcast a change to current subscribers of the record's case.
    fn publish(&self, event: ChangeEvent);
}

/// A live subscription to one case's change channel.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next change hint, or `None` once the channel is gone. Lagged gaps
    /// are skipped: a missed event is recovered by the re-fetch the next
    /// delivery triggers.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(component = "notifier", missed, "subscription lagged, continuing");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// In-process notifier: one broadcast channel per case, registry pruned as
/// channels lose their last subscriber.
#[derive(Default)]
pub struct InProcessNotifier {
    channels: DashMap<String, broadcast::Sender<ChangeEvent>>,
}

impl InProcessNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeNotifier for InProcessNotifier {
    fn subscribe(&self, case_id: &str) -> Subscription {
        let tx = self
            .channels
            .entry(case_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Subscription {
            rx: tx.subscribe(),
        }
    }

    fn publish(&self, event: ChangeEvent) {
        let case_id = event.record.case_id.clone();
        if let Some(tx) = self.channels.get(&case_id) {
            // Send fails only when nobody is subscribed; best-effort.
            let _ = tx.send(event);
            if tx.receiver_count() > 0 {
                return;
            }
        }
        // Drop channels with no remaining subscribers.
        self.channels
            .remove_if(&case_id, |_, tx| tx.receiver_count() == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casecall_protocol::{ChangeKind, CommunicationSession, SessionType};

    fn event(case_id: &str) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Insert,
            record: CommunicationSession::new(case_id, SessionType::Video, "a", "a", "b"),
        }
    }

    #[tokio::test]
    async fn delivers_only_to_the_matching_case() {
        let notifier = InProcessNotifier::new();
        let mut sub_a = notifier.subscribe("case-a");
        let mut sub_b = notifier.subscribe("case-b");

        notifier.publish(event("case-a"));

        let got = sub_a.recv().await.unwrap();
        assert_eq!(got.record.case_id, "case-a");

        // case-b saw nothing
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), sub_b.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let notifier = InProcessNotifier::new();
        notifier.publish(event("case-x"));
        assert!(notifier.channels.get("case-x").is_none());
    }

    #[tokio::test]
    async fn lagged_subscriber_keeps_receiving() {
        let notifier = InProcessNotifier::new();
        let mut sub = notifier.subscribe("case-a");

        for _ in 0..(CHANNEL_CAPACITY + 8) {
            notifier.publish(event("case-a"));
        }

        // First recv skips the lag and still yields an event.
        assert!(sub.recv().await.is_some());
    }
}
