use crate::prelude::*;

use super::{Consumer, EventHandler};
use crate::unwind::panic_message;
use tokio::sync::Mutex as AsyncMutex;

/// Consumer running its own task: take an event, hand it to the handler,
/// repeat until the shutdown sentinel is taken.
pub struct ActiveConsumer<H: EventHandler> {
    name: String,
    handler: Arc<AsyncMutex<H>>,
    queue: Option<EventQueue>,
    started: Arc<AtomicBool>,
    stop_requested: AtomicBool,
    shutdown_timeout: Duration,
}

impl<H: EventHandler> ActiveConsumer<H> {
    pub fn new(name: impl Into<String>, handler: H, shutdown_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(AsyncMutex::new(handler)),
            queue: None,
            started: Arc::new(AtomicBool::new(false)),
            stop_requested: AtomicBool::new(false),
            shutdown_timeout,
        }
    }

    pub fn handler(&self) -> Arc<AsyncMutex<H>> {
        self.handler.clone()
    }

    async fn task(
        name: String,
        queue: EventQueue,
        handler: Arc<AsyncMutex<H>>,
        started: Arc<AtomicBool>,
    ) {
        debug!("consumer {} task started", name);
        loop {
            match queue.take().await {
                Some(Event::Data(sample)) => {
                    let mut handler = handler.lock().await;
                    match AssertUnwindSafe(handler.handle(&sample)).catch_unwind().await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            counter!(CONSUMER_ERRORS_COUNTER, 1);
                            warn!("consumer {} failed to handle sample: {}", name, e);
                        }
                        Err(payload) => {
                            counter!(CONSUMER_ERRORS_COUNTER, 1);
                            error!(
                                "consumer {} panicked on sample: {}",
                                name,
                                panic_message(payload.as_ref())
                            );
                        }
                    }
                }
                Some(Event::Shutdown) => {
                    let mut handler = handler.lock().await;
                    started.store(false, Ordering::Release);
                    if let Err(e) = handler.on_shutdown().await {
                        warn!("consumer {} shutdown cleanup failed: {}", name, e);
                    }
                    info!("consumer {} stopped", name);
                    return;
                }
                None => {
                    started.store(false, Ordering::Release);
                    warn!("consumer {}: queue closed", name);
                    return;
                }
            }
        }
    }
}

impl<H: EventHandler> Debug for ActiveConsumer<H> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("ActiveConsumer")
            .field("name", &self.name)
            .field("started", &self.is_started())
            .finish()
    }
}

#[async_trait]
impl<H: EventHandler> Consumer for ActiveConsumer<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_queue(&mut self, queue: EventQueue) {
        self.queue = Some(queue);
    }

    async fn start(&self) -> Result<(), Error> {
        let queue = self
            .queue
            .clone()
            .ok_or_else(|| Error::consumer(&self.name, "queue is not set"))?;
        if self.started.swap(true, Ordering::AcqRel) {
            info!("consumer {} is already started", self.name);
            return Ok(());
        }
        self.stop_requested.store(false, Ordering::Release);
        tokio::spawn(Self::task(
            self.name.clone(),
            queue,
            self.handler.clone(),
            self.started.clone(),
        ));
        Ok(())
    }

    async fn stop(&self) -> Result<(), Error> {
        if !self.is_started() {
            debug!("consumer {} is not running", self.name);
            return Ok(());
        }
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            debug!("consumer {}: stop already requested", self.name);
            return Ok(());
        }
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| Error::consumer(&self.name, "queue is not set"))?;
        if let Err(e) = queue.put(Event::Shutdown, self.shutdown_timeout).await {
            self.stop_requested.store(false, Ordering::Release);
            return Err(Error::consumer(
                &self.name,
                format!("can't deliver shutdown sentinel: {}", e),
            ));
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}
