use crate::prelude::*;

use crate::{round::CollectionRound, unwind::{cancelled, panic_message}};
use tokio::time::MissedTickBehavior;

/// Period used when the configured interval is zero. The scheduler then runs
/// one round only, so the value is never observed.
const ONE_SHOT_PERIOD: Duration = Duration::from_secs(1);

/// Execution counters shared between the scheduler task and the coordinator.
#[derive(Debug, Default)]
pub struct ExecutionStats {
    executions: AtomicU64,
    successful: AtomicU64,
    last_failure: Mutex<Option<Error>>,
}

impl ExecutionStats {
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Acquire)
    }

    pub fn successful_executions(&self) -> u64 {
        self.successful.load(Ordering::Acquire)
    }

    pub fn last_failure(&self) -> Option<Error> {
        match self.last_failure.lock() {
            Ok(failure) => failure.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_failure(&self, error: Error) {
        match self.last_failure.lock() {
            Ok(mut failure) => *failure = Some(error),
            Err(poisoned) => *poisoned.into_inner() = Some(error),
        }
    }
}

/// Periodic driver of collection rounds.
pub struct Scheduler {
    round: CollectionRound,
    period: Duration,
    max_executions: Option<u64>,
    stats: Arc<ExecutionStats>,
}

impl Scheduler {
    /// Zero `period` means a single round.
    pub fn new(
        round: CollectionRound,
        period: Duration,
        max_executions: Option<u64>,
        stats: Arc<ExecutionStats>,
    ) -> Self {
        let (period, max_executions) = if period.is_zero() {
            (ONE_SHOT_PERIOD, Some(1))
        } else {
            (period, max_executions)
        };
        Self {
            round,
            period,
            max_executions,
            stats,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn max_executions(&self) -> Option<u64> {
        self.max_executions
    }

    /// Spawns the timer task. The returned receiver resolves if the task
    /// reached `max_executions`; it fails if the task was cancelled instead.
    pub fn spawn(self) -> (SchedulerHandle, oneshot::Receiver<()>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(());
        let (finished_tx, finished_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _done = done_tx;
            if self.task(cancel_rx).await {
                let _ = finished_tx.send(());
            }
        });
        let handle = SchedulerHandle {
            cancel: cancel_tx,
            done: done_rx,
        };
        (handle, finished_rx)
    }

    /// Returns `true` if the loop ended because the execution limit was hit.
    async fn task(self, mut cancel: watch::Receiver<bool>) -> bool {
        info!(
            "scheduler started, period: {:?}, max executions: {:?}",
            self.period, self.max_executions
        );
        let mut interval = interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // cancel wins over a tick that became due during a long round
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    info!("scheduler cancelled after {} executions", self.stats.executions());
                    return false;
                }
                _ = interval.tick() => {}
            }
            let total = self.tick().await;
            if self.max_executions.map_or(false, |max| total >= max) {
                info!("scheduler finished after {} executions", total);
                return true;
            }
        }
    }

    /// Runs one round, never fails. Returns the total execution count.
    pub async fn tick(&self) -> u64 {
        let total = self.stats.executions.fetch_add(1, Ordering::AcqRel) + 1;
        counter!(ROUNDS_TOTAL_COUNTER, 1);
        let timer = Instant::now();
        let res = AssertUnwindSafe(self.round.run()).catch_unwind().await;
        histogram!(ROUND_TIMER, timer.elapsed().as_nanos() as f64);
        let failure = match res {
            Ok(Ok(report)) => {
                self.stats.successful.fetch_add(1, Ordering::AcqRel);
                counter!(ROUNDS_SUCCEEDED_COUNTER, 1);
                debug!("round {} done: {:?}", total, report);
                return total;
            }
            Ok(Err(e)) => e,
            Err(payload) => Error::internal(format!(
                "round panicked: {}",
                panic_message(payload.as_ref())
            )),
        };
        counter!(ROUNDS_FAILED_COUNTER, 1);
        error!("round {} failed: {}", total, failure);
        self.stats.record_failure(failure);
        total
    }
}

impl Debug for Scheduler {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("Scheduler")
            .field("period", &self.period)
            .field("max_executions", &self.max_executions)
            .field("round", &self.round)
            .finish()
    }
}

/// Control side of a spawned scheduler task.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: watch::Sender<bool>,
    done: watch::Receiver<()>,
}

impl SchedulerHandle {
    /// Stops the loop before the next tick. A running round completes.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Waits for the task to exit. Returns `false` if it is still running after `limit`.
    pub async fn wait_done(&mut self, limit: Duration) -> bool {
        let done = &mut self.done;
        tokio::time::timeout(limit, async move { while done.changed().await.is_ok() {} })
            .await
            .is_ok()
    }
}
