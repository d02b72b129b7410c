use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;

use chatpilot_core_types::CoreError;

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), CoreError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Broadcast-backed bus carrying domain events to any number of passive
/// subscribers. Subscribers that fall behind lose the oldest events; nothing
/// is acknowledged or returned.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Publishing to a bus nobody listens on is not an error; the event is
    /// simply dropped.
    pub fn emit(&self, event: E) {
        if self.sender.send(event).is_err() {
            trace!("event dropped: no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), CoreError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| CoreError::new(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Materialise an mpsc receiver from the bus subscription so callers can
/// await events without handling broadcast lag semantics directly.
pub fn to_mpsc<E>(bus: Arc<InMemoryBus<E>>, capacity: usize) -> mpsc::Receiver<E>
where
    E: Event,
{
    let mut rx = bus.subscribe();
    let (tx, out_rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if tx.send(ev).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    out_rx
}

/// Await the first event on `rx` satisfying `predicate`, bounded by
/// `deadline`. Lagged gaps are skipped; a closed channel or an elapsed
/// deadline yields `None`.
pub async fn recv_matching<E, F>(
    rx: &mut broadcast::Receiver<E>,
    deadline: Duration,
    mut predicate: F,
) -> Option<E>
where
    E: Event,
    F: FnMut(&E) -> bool,
{
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(ev) if predicate(&ev) => return Some(ev),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };
    tokio::time::timeout(deadline, wait).await.ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = InMemoryBus::<u32>::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(7).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), 7);
        assert_eq!(b.recv().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_silent() {
        let bus = InMemoryBus::<u32>::new(8);
        bus.emit(1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn to_mpsc_materialises_the_subscription() {
        let bus = InMemoryBus::<u32>::new(8);
        let mut rx = to_mpsc(Arc::clone(&bus), 8);
        tokio::task::yield_now().await;
        bus.emit(42);
        assert_eq!(rx.recv().await, Some(42));
    }

    #[tokio::test]
    async fn recv_matching_skips_non_matching_events() {
        let bus = InMemoryBus::<u32>::new(8);
        let mut rx = bus.subscribe();
        bus.emit(1);
        bus.emit(2);
        bus.emit(3);
        let found = recv_matching(&mut rx, Duration::from_secs(1), |ev| *ev > 2).await;
        assert_eq!(found, Some(3));
    }

    #[tokio::test]
    async fn recv_matching_times_out() {
        let bus = InMemoryBus::<u32>::new(8);
        let mut rx = bus.subscribe();
        let found = recv_matching(&mut rx, Duration::from_millis(20), |_| true).await;
        assert_eq!(found, None);
    }
}
