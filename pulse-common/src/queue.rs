//! Bounded multi-producer/multi-consumer event queue.
//!
//! Producers share a cloned sender. Consumers share the single receiver behind an
//! async mutex, so every event is taken by exactly one consumer and each consumer
//! observes its events in enqueue order.

use crate::{error::Error, event::Event};
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::{
    mpsc::{
        channel,
        error::{SendTimeoutError, TrySendError},
        Receiver, Sender,
    },
    Mutex,
};

#[derive(Clone)]
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Arc<Mutex<Receiver<Event>>>,
    capacity: usize,
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl EventQueue {
    /// # Panics
    /// Panics if `capacity` is zero, config validation rejects that value earlier.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            capacity,
        }
    }

    /// Non-blocking enqueue used on the data path.
    /// # Errors
    /// `QueueFull` when there is no free slot, the event is dropped.
    pub fn offer(&self, event: Event) -> Result<(), Error> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::queue_full()),
            Err(TrySendError::Closed(_)) => Err(Error::queue_closed()),
        }
    }

    /// Enqueue waiting at most `timeout` for a free slot. Used for the shutdown sentinel.
    /// # Errors
    /// `QueueTimeout` if no slot was freed in time.
    pub async fn put(&self, event: Event, timeout: Duration) -> Result<(), Error> {
        match self.tx.send_timeout(event, timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(Error::queue_timeout()),
            Err(SendTimeoutError::Closed(_)) => Err(Error::queue_closed()),
        }
    }

    /// Waits for the next event. Returns `None` only if the queue was closed.
    pub async fn take(&self) -> Option<Event> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Takes an event if one is ready, never waits for a producer.
    pub fn try_take(&self) -> Option<Event> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Sample;
    use chrono::Utc;

    fn data() -> Event {
        Event::Data(Sample::new(Utc::now(), vec![]))
    }

    #[tokio::test]
    async fn test_offer_fails_when_full() {
        let queue = EventQueue::new(1);
        queue.offer(data()).unwrap();
        assert_eq!(queue.len(), 1);
        let err = queue.offer(data()).unwrap_err();
        assert!(err.is_queue_full());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_put_times_out_on_full_queue() {
        let queue = EventQueue::new(1);
        queue.offer(data()).unwrap();
        let err = queue
            .put(Event::Shutdown, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &crate::error::Kind::QueueTimeout);
    }

    #[tokio::test]
    async fn test_put_waits_for_free_slot() {
        let queue = EventQueue::new(1);
        queue.offer(data()).unwrap();
        let consumer = queue.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            consumer.take().await
        });
        queue
            .put(Event::Shutdown, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(matches!(handle.await.unwrap(), Some(Event::Data(_))));
        assert!(queue.take().await.unwrap().is_shutdown());
    }

    #[tokio::test]
    async fn test_fifo_order_with_sentinel() {
        let queue = EventQueue::new(8);
        for _ in 0..3 {
            queue.offer(data()).unwrap();
        }
        queue.put(Event::Shutdown, Duration::from_secs(1)).await.unwrap();
        for _ in 0..3 {
            assert!(!queue.take().await.unwrap().is_shutdown());
        }
        assert!(queue.take().await.unwrap().is_shutdown());
        assert!(queue.is_empty());
        assert!(queue.try_take().is_none());
    }
}
