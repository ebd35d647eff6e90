//! Reading half of a subscriber channel

use std::task::{Context, Poll};

use tokio::sync::mpsc;

use super::broker::Broker;
use super::entry::SubscriberId;
use super::event::Event;

/// A registered subscriber
///
/// Yields every event published while it is registered. Deregistration is
/// submitted at most once: either by [`Subscription::deregister`] or when the
/// subscription is dropped, whichever comes first.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Event>,
    broker: Broker,
    deregistered: bool,
}

impl Subscription {
    pub(super) fn new(id: SubscriberId, rx: mpsc::Receiver<Event>, broker: Broker) -> Self {
        Self {
            id,
            rx,
            broker,
            deregistered: false,
        }
    }

    /// Identity of this subscriber
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the registry has closed the channel.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Poll for the next event
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.rx.poll_recv(cx)
    }

    /// Ask the registry to remove this subscriber.
    ///
    /// Events already handed over can still be read; after that `recv`
    /// returns `None`. Calling this more than once has no further effect.
    pub fn deregister(&mut self) {
        if self.deregistered {
            return;
        }
        self.deregistered = true;
        self.broker.deregister(self.id);
    }

    /// Whether deregistration has been submitted
    pub fn is_deregistered(&self) -> bool {
        self.deregistered
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.deregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_deregistration() {
        let (broker, _task) = Broker::spawn();
        let mut subscription = broker.register().unwrap();

        subscription.deregister();
        subscription.deregister();
        assert!(subscription.is_deregistered());
        drop(subscription);

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.deregistrations, 1);
        assert_eq!(stats.active_subscribers, 0);
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let (broker, _task) = Broker::spawn();
        let subscription = broker.register().unwrap();
        assert!(!subscription.is_deregistered());

        drop(subscription);

        let stats = broker.stats().await.unwrap();
        assert_eq!(stats.deregistrations, 1);
        assert_eq!(stats.active_subscribers, 0);
    }

    #[tokio::test]
    async fn test_poll_recv_pending_until_publish() {
        let (broker, _task) = Broker::spawn();
        let mut subscription = broker.register().unwrap();

        let mut recv = tokio_test::task::spawn(std::future::poll_fn(|cx| subscription.poll_recv(cx)));
        tokio_test::assert_pending!(recv.poll());

        let publisher = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.publish("x").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(recv.is_woken());
        assert_eq!(recv.poll(), Poll::Ready(Some(Event::from("x"))));
        drop(recv);
        assert_eq!(publisher.await.unwrap().unwrap(), 1);
    }
}
