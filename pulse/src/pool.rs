use crate::prelude::*;

use crate::{query_task::SourceQueryTask, unwind::cancelled};
use tokio::time::timeout;

pub type QueryHandle = JoinHandle<Result<Vec<Property>, Error>>;

/// Fixed-size concurrency limit for source queries.
///
/// Every submitted task is spawned at once and waits for one of `size`
/// permits. `shutdown` rejects new tasks, gives in-flight ones a grace
/// period and then cancels the rest through the shared cancel signal.
pub struct WorkerPool {
    size: usize,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
    cancel: watch::Sender<bool>,
    query_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(size: usize, query_timeout: Option<Duration>) -> Self {
        let size = size.max(1);
        let (cancel, _) = watch::channel(false);
        debug!("worker pool of {} permits created", size);
        Self {
            size,
            permits: Arc::new(Semaphore::new(size)),
            closed: AtomicBool::new(false),
            cancel,
            query_timeout,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of tasks running right now.
    pub fn active(&self) -> usize {
        self.size - self.permits.available_permits().min(self.size)
    }

    /// # Errors
    /// `PoolClosed` after `shutdown` was called.
    pub fn submit(&self, task: SourceQueryTask) -> Result<QueryHandle, Error> {
        if self.is_closed() {
            return Err(Error::pool_closed());
        }
        let permits = self.permits.clone();
        let mut cancel = self.cancel.subscribe();
        let query_timeout = self.query_timeout;
        let handle = tokio::spawn(async move {
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Err(Error::pool_closed()),
                },
                _ = cancelled(&mut cancel) => return Err(Error::cancelled()),
            };
            let address = task.address().clone();
            let query = async move {
                match query_timeout {
                    Some(t) => match timeout(t, task.run()).await {
                        Ok(res) => res,
                        Err(_) => {
                            debug!("query of {} timed out after {:?}", address, t);
                            Err(Error::timeout())
                        }
                    },
                    None => task.run().await,
                }
            };
            tokio::select! {
                res = query => res,
                _ = cancelled(&mut cancel) => Err(Error::cancelled()),
            }
        });
        Ok(handle)
    }

    /// Returns `true` if every in-flight task finished within `grace`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return true;
        }
        let all = u32::try_from(self.size).unwrap_or(u32::MAX);
        let drained = match timeout(grace, self.permits.acquire_many(all)).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    "{} source queries still running after {:?}, cancelling",
                    self.active(),
                    grace
                );
                self.cancel.send_replace(true);
                false
            }
        };
        self.permits.close();
        debug!("worker pool is shut down");
        drained
    }
}

impl Debug for WorkerPool {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("active", &self.active())
            .field("closed", &self.is_closed())
            .finish()
    }
}
