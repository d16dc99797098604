//! Live transport port definitions.
//!
//! The engine does not manage the socket. It sends through whatever is
//! connected and listens to a stream of raw payloads; connect, reconnect and
//! backoff belong to the transport implementation.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::Message;

/// Errors reported synchronously by a send attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No live connection; the REST fallback should be tried.
    #[error("Live transport is not connected")]
    NotConnected,

    #[error("Send rejected: {0}")]
    Rejected(String),

    /// The REST fallback itself failed.
    #[error("Fallback send failed: {0}")]
    Fallback(String),

    #[error("Not authorized to send")]
    Unauthorized,
}

/// Receiving end of the live channel.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct LiveSubscription {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl LiveSubscription {
    pub const fn new(rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self { rx }
    }

    /// A connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<Value>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Next raw payload, or `None` once the transport has gone away.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }
}

/// Port for the live push channel.
pub trait TransportPort: Send + Sync {
    /// Fire-and-forget send. Confirmation arrives later as an echo.
    fn send(&self, from_id: &str, to_id: &str, body: &str) -> Result<(), TransportError>;

    /// Start receiving raw incoming payloads.
    fn subscribe(&self) -> LiveSubscription;
}

/// REST send path, used only when the live transport is not connected.
#[async_trait]
pub trait FallbackSendPort: Send + Sync {
    /// Persist the message and return the server's copy.
    async fn send_fallback_rest(
        &self,
        from_id: &str,
        to_id: &str,
        body: &str,
    ) -> Result<Message, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscription_receives_in_order() {
        let (tx, mut sub) = LiveSubscription::channel();
        tx.send(json!({"n": 1})).unwrap();
        tx.send(json!({"n": 2})).unwrap();
        drop(tx);

        assert_eq!(sub.recv().await, Some(json!({"n": 1})));
        assert_eq!(sub.recv().await, Some(json!({"n": 2})));
        assert_eq!(sub.recv().await, None);
    }
}
