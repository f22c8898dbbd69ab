//! Event Bus (spec.md §4.I)
//!
//! Fans swap lifecycle events out to any number of subscribers (a UI, a
//! metrics exporter, a notification service) over [`tokio::sync::broadcast`].
//! Each subscriber gets its own bounded `mpsc` forwarding task so one slow
//! consumer can't block delivery to the others, and a lagged subscriber is
//! surfaced as a `subscriber_lagged` diagnostic rather than silently
//! dropping events without anyone noticing — the teacher's websocket
//! fan-out (`deposit_tracker::websocket`) uses a single broadcast channel
//! per consumer; this adds the per-subscriber bounded buffer because swap
//! events must not be lost the way a live price tick can be.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

/// Event bus errors.
#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("no subscribers are currently attached")]
    NoSubscribers,
}

/// A swap lifecycle event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SwapEvent {
    OfferReceived { trade_id: String },
    NoncesExchanged { trade_id: String, symbol: String },
    FundingSeen { trade_id: String, symbol: String, txid: String },
    SignaturesCombined { trade_id: String, symbol: String },
    SecretRevealed { trade_id: String },
    SwapCompleted { trade_id: String },
    SwapRefunded { trade_id: String, symbol: String },
    SwapFailed { trade_id: String, reason: String },
}

/// Fan-out event bus: one `broadcast::Sender` feeding N bounded per-
/// subscriber channels.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SwapEvent>,
    subscriber_buffer: usize,
}

impl EventBus {
    /// `capacity` bounds the internal broadcast channel (how far a
    /// subscriber can lag before missing events); `subscriber_buffer`
    /// bounds each subscriber's own forwarding queue.
    pub fn new(capacity: usize, subscriber_buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, subscriber_buffer }
    }

    pub fn publish(&self, event: SwapEvent) {
        // No subscribers is not an error here — publishing must never
        // block on, or fail because of, the absence of a listener.
        let _ = self.sender.send(event);
    }

    /// Subscribe and get back a receiver fed by a dedicated forwarding
    /// task. If the task detects `RecvError::Lagged`, it emits a
    /// `subscriber_lagged` diagnostic through `tracing` and keeps going
    /// from the next available event, rather than silently resyncing.
    pub fn subscribe(&self) -> mpsc::Receiver<SwapEvent> {
        let mut broadcast_rx = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            target: "swap::events",
                            skipped,
                            "subscriber_lagged: dropped {} events, resuming from the next available",
                            skipped
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let bus = EventBus::new(16, 16);
        let mut rx = bus.subscribe();
        // give the forwarding task a chance to register
        tokio::task::yield_now().await;

        bus.publish(SwapEvent::OfferReceived { trade_id: "t1".to_string() });

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, SwapEvent::OfferReceived { trade_id } if trade_id == "t1"));
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16, 16);
        bus.publish(SwapEvent::SwapCompleted { trade_id: "t1".to_string() });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_every_event() {
        let bus = EventBus::new(16, 16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        tokio::task::yield_now().await;

        bus.publish(SwapEvent::SwapCompleted { trade_id: "t2".to_string() });

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
