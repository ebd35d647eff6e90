//! Per-connection event stream
//!
//! Bridges one [`Subscription`] to one HTTP response body. Each event becomes
//! one SSE-framed body chunk, which the HTTP stack writes and flushes as soon
//! as it is yielded.
//!
//! Client disconnect is observed by the HTTP stack dropping the body. The
//! drop releases the subscription, which submits the connection's single
//! deregistration.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

use crate::registry::{Broker, RegistryError, SubscriberId, Subscription};

use super::sse;

/// Lifecycle of a streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Registered, response not yet being read
    Connecting,
    /// Body is being polled, forwarding events
    Open,
    /// Client went away, deregistration submitted; waiting for the broker
    /// to close the channel
    Disconnecting,
    /// Channel closed by the broker; no more events
    Closed,
}

/// SSE body stream for one client
#[derive(Debug)]
pub struct EventStream {
    subscription: Subscription,
    phase: StreamPhase,
    sent: u64,
}

impl EventStream {
    /// Register a new subscriber and wrap it
    pub fn connect(broker: &Broker) -> Result<Self, RegistryError> {
        let subscription = broker.register()?;

        Ok(Self {
            subscription,
            phase: StreamPhase::Connecting,
            sent: 0,
        })
    }

    /// Stop forwarding and ask the broker to remove this subscriber.
    ///
    /// Events already handed over are still yielded; the stream ends once the
    /// broker closes the channel. No effect after the first call.
    pub fn disconnect(&mut self) {
        if !matches!(self.phase, StreamPhase::Connecting | StreamPhase::Open) {
            return;
        }

        self.phase = StreamPhase::Disconnecting;
        self.subscription.deregister();
        tracing::debug!(
            subscriber = %self.subscription.id(),
            events = self.sent,
            "Client disconnected"
        );
    }

    /// Subscriber backing this stream
    pub fn id(&self) -> SubscriberId {
        self.subscription.id()
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Number of events written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.phase {
            StreamPhase::Closed => return Poll::Ready(None),
            StreamPhase::Connecting => {
                this.phase = StreamPhase::Open;
                tracing::debug!(subscriber = %this.subscription.id(), "Event stream opened");
            }
            StreamPhase::Open | StreamPhase::Disconnecting => {}
        }

        match this.subscription.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                this.sent += 1;
                Poll::Ready(Some(Ok(sse::format_event(&event))))
            }
            Poll::Ready(None) => {
                this.phase = StreamPhase::Closed;
                tracing::debug!(
                    subscriber = %this.subscription.id(),
                    events = this.sent,
                    "Event stream closed by broker"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use futures::{FutureExt, StreamExt};
    use tokio_test::{assert_pending, task};

    use super::*;

    #[tokio::test]
    async fn test_forwards_framed_events() {
        let (broker, _task) = Broker::spawn();
        let mut stream = EventStream::connect(&broker).unwrap();
        assert_eq!(stream.phase(), StreamPhase::Connecting);

        let (delivered, chunk) = tokio::join!(broker.publish("hello"), stream.next());
        assert_eq!(stream.phase(), StreamPhase::Open);

        assert_eq!(delivered.unwrap(), 1);
        assert_eq!(chunk.unwrap().unwrap(), Bytes::from_static(b"data: Event: hello\n\n"));
        assert_eq!(stream.sent(), 1);
    }

    #[tokio::test]
    async fn test_pending_without_events() {
        let (broker, _task) = Broker::spawn();
        let mut stream = task::spawn(EventStream::connect(&broker).unwrap());

        assert_pending!(stream.poll_next());
    }

    #[tokio::test]
    async fn test_ends_when_broker_closes() {
        let (broker, _task) = Broker::spawn();
        let mut stream = EventStream::connect(&broker).unwrap();

        broker.shutdown();

        assert!(stream.next().await.is_none());
        assert_eq!(stream.phase(), StreamPhase::Closed);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_deregisters_once() {
        let (broker, _task) = Broker::spawn();
        let stream = EventStream::connect(&broker).unwrap();
        let id = stream.id();

        drop(stream);

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.deregistrations, 1);
        assert!(!broker.subscribers().await.unwrap().contains(&id));
    }

    #[tokio::test]
    async fn test_connect_fails_when_broker_stopped() {
        let (broker, task) = Broker::spawn();
        broker.shutdown();
        task.await.unwrap();

        let result = EventStream::connect(&broker);
        assert!(matches!(result, Err(RegistryError::BrokerClosed)));
    }

    #[tokio::test]
    async fn test_opens_on_first_poll() {
        let (broker, _task) = Broker::spawn();
        let mut stream = EventStream::connect(&broker).unwrap();

        assert!(stream.next().now_or_never().is_none());
        assert_eq!(stream.phase(), StreamPhase::Open);
    }

    #[tokio::test]
    async fn test_disconnect_then_closed_by_broker() {
        let (broker, _task) = Broker::spawn();
        let mut stream = EventStream::connect(&broker).unwrap();

        stream.disconnect();
        assert_eq!(stream.phase(), StreamPhase::Disconnecting);

        // The broker processes the deregistration and closes the channel
        assert!(stream.next().await.is_none());
        assert_eq!(stream.phase(), StreamPhase::Closed);

        stream.disconnect();
        drop(stream);

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.deregistrations, 1);
        assert_eq!(stats.active_subscribers, 0);
    }
}
