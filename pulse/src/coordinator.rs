use crate::prelude::*;

use crate::{
    consumer::{factory::ConsumerFactory, Consumer},
    pool::WorkerPool,
    round::{Binding, CollectionRound},
    scheduler::{ExecutionStats, Scheduler, SchedulerHandle},
};
use pulse_sources::SourceFactory;

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_POOL_SIZE_FLOOR: usize = 2;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POOL_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Sizing and timing of the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Zero means a single round.
    pub sampling_interval: Duration,
    pub max_executions: Option<u64>,
    pub queue_capacity: usize,
    pub pool_size_floor: usize,
    /// Bounded wait for delivering the shutdown sentinel.
    pub shutdown_timeout: Duration,
    pub pool_shutdown_grace: Duration,
    pub query_timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sampling_interval: Duration::from_secs(10),
            max_executions: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pool_size_floor: DEFAULT_POOL_SIZE_FLOOR,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            pool_shutdown_grace: DEFAULT_POOL_SHUTDOWN_GRACE,
            query_timeout: None,
        }
    }
}

impl From<&AgentConfig> for EngineSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            sampling_interval: config.sampling_interval(),
            max_executions: config.max_executions(),
            queue_capacity: config.queue_capacity(),
            pool_size_floor: config.pool_size_floor(),
            shutdown_timeout: config.shutdown_timeout(),
            pool_shutdown_grace: config.pool_shutdown_grace(),
            query_timeout: config.query_timeout(),
        }
    }
}

/// Outcome of [`Coordinator::stop`], clean if no step failed.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    errors: Vec<Error>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }
}

/// Process-level signal fired once the coordinator has fully stopped.
#[derive(Debug, Clone)]
pub struct ExitLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl ExitLatch {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns `false` if the latch was already fired.
    fn fire(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub address: String,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumerHealth {
    pub name: String,
    pub started: bool,
}

/// Snapshot of the engine state.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub executions: u64,
    pub successful_executions: u64,
    pub last_failure: Option<String>,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub sources: Vec<SourceHealth>,
    pub consumers: Vec<ConsumerHealth>,
    pub stopped: bool,
}

/// Owner of the queue, the pool, the sources and the consumers.
///
/// Lifecycle: `new`/`initialize` → `start` → `stop`. The scheduler calls
/// `stop` by itself once `max_executions` rounds are done.
pub struct Coordinator {
    settings: EngineSettings,
    plan: MetricPlan,
    sources: Vec<Arc<dyn MetricSource>>,
    consumers: Vec<Box<dyn Consumer>>,
    queue: EventQueue,
    stats: Arc<ExecutionStats>,
    pool: Mutex<Option<Arc<WorkerPool>>>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    started: AtomicBool,
    stopped: AtomicBool,
    report: Mutex<Option<ShutdownReport>>,
    latch: ExitLatch,
}

impl Coordinator {
    /// # Errors
    /// Config error for zero queue capacity or duplicate source addresses,
    /// `UnresolvedAddress` if a definition has no source.
    pub fn new(
        settings: EngineSettings,
        plan: impl Into<MetricPlan>,
        sources: Vec<Arc<dyn MetricSource>>,
        mut consumers: Vec<Box<dyn Consumer>>,
    ) -> Result<Self, Error> {
        let plan = plan.into();
        if settings.queue_capacity == 0 {
            return Err(Error::config("queue capacity must be positive"));
        }
        for (i, source) in sources.iter().enumerate() {
            if sources[..i].iter().any(|s| s.address() == source.address()) {
                return Err(Error::config(format!(
                    "source {} is registered twice",
                    source.address()
                )));
            }
        }
        for address in plan.addresses() {
            if !sources.iter().any(|s| s.address() == &address) {
                error!("no source configured for {}", address);
                return Err(Error::unresolved_address(&address));
            }
        }
        let queue = EventQueue::new(settings.queue_capacity);
        for consumer in &mut consumers {
            consumer.set_queue(queue.clone());
        }
        Ok(Self {
            settings,
            plan,
            sources,
            consumers,
            queue,
            stats: Arc::new(ExecutionStats::default()),
            pool: Mutex::new(None),
            scheduler: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            report: Mutex::new(None),
            latch: ExitLatch::new(),
        })
    }

    /// Builds sources and consumers described by `config`.
    /// # Errors
    /// Any source or consumer that can't be built, see also [`Coordinator::new`].
    pub fn initialize(
        config: &AgentConfig,
        source_factory: &SourceFactory,
        consumer_factory: &ConsumerFactory,
    ) -> Result<Arc<Self>, Error> {
        let sources = config
            .sources()
            .iter()
            .map(|c| source_factory.create(c))
            .collect::<AnyResult<Vec<_>>>()
            .map_err(|e| Error::config(format!("{:#}", e)))?;
        let consumers = config
            .consumers()
            .iter()
            .map(|c| consumer_factory.create(c))
            .collect::<AnyResult<Vec<_>>>()
            .map_err(|e| Error::config(format!("{:#}", e)))?;
        let settings = EngineSettings::from(config);
        let coordinator = Self::new(settings, config.plan(), sources, consumers)?;
        info!(
            "coordinator initialized: {} sources, {} metrics, {} consumers",
            coordinator.sources.len(),
            coordinator.plan.definitions().len(),
            coordinator.consumers.len()
        );
        Ok(Arc::new(coordinator))
    }

    /// Starts consumers and spawns the scheduler.
    /// # Errors
    /// `AlreadyStarted` on the second call, or the error of the first consumer
    /// that failed to start.
    pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::already_started());
        }
        for consumer in &self.consumers {
            consumer.start().await.map_err(|e| {
                error!("consumer {} failed to start: {}", consumer.name(), e);
                e
            })?;
        }
        let pool = Arc::new(WorkerPool::new(
            self.pool_size(),
            self.settings.query_timeout,
        ));
        *lock(&self.pool) = Some(pool.clone());
        let round = CollectionRound::new(self.bindings(), pool, self.queue.clone());
        let scheduler = Scheduler::new(
            round,
            self.settings.sampling_interval,
            self.settings.max_executions,
            self.stats.clone(),
        );
        let (handle, finished) = scheduler.spawn();
        *lock(&self.scheduler) = Some(handle);
        let coordinator = self.clone();
        tokio::spawn(async move {
            if finished.await.is_ok() {
                info!("no more rounds scheduled, stopping");
                let report = coordinator.stop().await;
                if !report.is_clean() {
                    warn!("self-stop was not clean: {:?}", report.errors());
                }
            }
        });
        info!("coordinator started");
        Ok(())
    }

    /// Stops every part of the engine, continuing past failures, and fires the
    /// exit latch. A repeated call returns a clean report and does nothing.
    pub async fn stop(&self) -> ShutdownReport {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!("coordinator is already stopped");
            return ShutdownReport::default();
        }
        info!("coordinator is stopping");
        let mut errors = Vec::new();

        let scheduler = lock(&self.scheduler).take();
        if let Some(handle) = &scheduler {
            handle.cancel();
        }
        let pool = lock(&self.pool).take();
        if let Some(pool) = pool {
            pool.shutdown(self.settings.pool_shutdown_grace).await;
        }
        if let Some(mut handle) = scheduler {
            if !handle.wait_done(self.settings.shutdown_timeout).await {
                warn!("scheduler is still running");
                errors.push(Error::timeout());
            }
        }

        for source in &self.sources {
            if let Err(e) = source.stop().await {
                error!("source {} failed to stop: {}", source.address(), e);
                errors.push(e);
            }
        }

        if let Err(e) = self
            .queue
            .put(Event::Shutdown, self.settings.shutdown_timeout)
            .await
        {
            error!("can't deliver shutdown sentinel: {}", e);
            errors.push(e);
        }

        for consumer in &self.consumers {
            if let Err(e) = consumer.stop().await {
                error!("consumer {} failed to stop: {}", consumer.name(), e);
                errors.push(e);
            }
        }

        info!("coordinator stopped, {} errors", errors.len());
        let report = ShutdownReport { errors };
        *lock(&self.report) = Some(report.clone());
        self.latch.fire();
        report
    }

    fn bindings(&self) -> Vec<Binding> {
        self.plan
            .grouped()
            .into_iter()
            .filter_map(|(address, defs)| {
                self.sources
                    .iter()
                    .find(|s| s.address() == &address)
                    .map(|s| (s.clone(), defs))
            })
            .collect()
    }

    /// `max(distinct sources, pool_size_floor)`.
    pub fn pool_size(&self) -> usize {
        self.sources.len().max(self.settings.pool_size_floor)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn plan(&self) -> &MetricPlan {
        &self.plan
    }

    /// Registered sources in declared order.
    pub fn sources(&self) -> &[Arc<dyn MetricSource>] {
        &self.sources
    }

    pub fn consumers(&self) -> &[Box<dyn Consumer>] {
        &self.consumers
    }

    /// Attachment point for consumers built outside the coordinator.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn executions(&self) -> u64 {
        self.stats.executions()
    }

    pub fn successful_executions(&self) -> u64 {
        self.stats.successful_executions()
    }

    pub fn last_failure(&self) -> Option<Error> {
        self.stats.last_failure()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Report of the first completed `stop`, whoever called it.
    pub fn shutdown_report(&self) -> Option<ShutdownReport> {
        lock(&self.report).clone()
    }

    pub fn exit_latch(&self) -> ExitLatch {
        self.latch.clone()
    }

    pub fn health(&self) -> Health {
        Health {
            executions: self.executions(),
            successful_executions: self.successful_executions(),
            last_failure: self.last_failure().map(|e| e.to_string()),
            queue_depth: self.queue_depth(),
            queue_capacity: self.queue_capacity(),
            sources: self
                .sources
                .iter()
                .map(|s| SourceHealth {
                    address: s.address().to_string(),
                    started: s.is_started(),
                })
                .collect(),
            consumers: self
                .consumers
                .iter()
                .map(|c| ConsumerHealth {
                    name: c.name().to_string(),
                    started: c.is_started(),
                })
                .collect(),
            stopped: self.is_stopped(),
        }
    }
}

impl Debug for Coordinator {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("Coordinator")
            .field("settings", &self.settings)
            .field("sources", &self.sources.len())
            .field("consumers", &self.consumers)
            .field("queue", &self.queue)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
