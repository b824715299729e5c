use crate::prelude::*;

use super::Consumer;

/// Consumer drained by its owner through [`PolledConsumer::poll`].
#[derive(Debug)]
pub struct PolledConsumer {
    name: String,
    queue: Option<EventQueue>,
    started: AtomicBool,
}

impl PolledConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: None,
            started: AtomicBool::new(false),
        }
    }

    /// Waits for the next sample. Returns `None` once the sentinel was taken
    /// or while the consumer is stopped.
    pub async fn poll(&self) -> Option<Sample> {
        if !self.is_started() {
            return None;
        }
        let event = self.queue.as_ref()?.take().await;
        self.accept(event)
    }

    /// Same as [`poll`](Self::poll) but never waits for a producer.
    pub fn try_poll(&self) -> Option<Sample> {
        if !self.is_started() {
            return None;
        }
        match self.queue.as_ref()?.try_take() {
            Some(event) => self.accept(Some(event)),
            None => None,
        }
    }

    fn accept(&self, event: Option<Event>) -> Option<Sample> {
        match event {
            Some(Event::Data(sample)) => Some(sample),
            Some(Event::Shutdown) | None => {
                self.started.store(false, Ordering::Release);
                info!("consumer {} stopped", self.name);
                None
            }
        }
    }
}

#[async_trait]
impl Consumer for PolledConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_queue(&mut self, queue: EventQueue) {
        self.queue = Some(queue);
    }

    async fn start(&self) -> Result<(), Error> {
        if self.queue.is_none() {
            return Err(Error::consumer(&self.name, "queue is not set"));
        }
        if self.started.swap(true, Ordering::AcqRel) {
            info!("consumer {} is already started", self.name);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), Error> {
        self.started.store(false, Ordering::Release);
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}
