//! Quote lifecycle events and the EventBus
//!
//! The notification collaborator subscribes to the bus; publishing is
//! fire-and-forget so a slow or absent subscriber never affects a pricing
//! decision that has already been made.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the pricing worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuoteEvent {
    /// Quote priced and cleared for automatic sending
    ///
    /// Triggers:
    /// - Notification: render and deliver the customer email
    QuoteSent {
        quote_id: Uuid,
        tenant_id: Uuid,
        total: f64,
        currency: String,
        /// Short summary for the notification (line labels, range, notes)
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// Quote priced but held for manual approval
    QuoteHeldForReview {
        quote_id: Uuid,
        tenant_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Pricing run failed before a result could be stored
    PricingFailed {
        quote_id: Uuid,
        error: String,
        retryable: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Wraps `tokio::sync::broadcast`:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use sqe_common::events::{EventBus, QuoteEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(QuoteEvent::PricingFailed {
///     quote_id: uuid::Uuid::new_v4(),
///     error: "database unavailable".into(),
///     retryable: true,
///     timestamp: chrono::Utc::now(),
/// });
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QuoteEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<QuoteEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: QuoteEvent,
    ) -> Result<usize, broadcast::error::SendError<QuoteEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: QuoteEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("No subscribers for quote event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let quote_id = Uuid::new_v4();

        bus.emit(QuoteEvent::QuoteHeldForReview {
            quote_id,
            tenant_id: Uuid::new_v4(),
            reason: "high value".to_string(),
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            QuoteEvent::QuoteHeldForReview { quote_id: id, .. } => assert_eq!(id, quote_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors_but_lossy_does_not_panic() {
        let bus = EventBus::new(4);
        let event = QuoteEvent::PricingFailed {
            quote_id: Uuid::new_v4(),
            error: "boom".to_string(),
            retryable: false,
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = QuoteEvent::QuoteSent {
            quote_id: Uuid::nil(),
            tenant_id: Uuid::nil(),
            total: 1250.0,
            currency: "USD".to_string(),
            summary: "Base fee".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "QuoteSent");
        assert_eq!(json["total"], 1250.0);
    }
}
