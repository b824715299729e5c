use crate::prelude::*;

use crate::{aggregator::EventAggregator, pool::WorkerPool, query_task::SourceQueryTask};
use log::Level;

const FAILURES_LOG_INTERVAL_MS: u64 = 5000;

/// Outcome of a round whose sample reached the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RoundReport {
    pub sources_queried: usize,
    pub sources_failed: usize,
    pub sources_missing: usize,
}

/// Source together with the definitions bound to it.
pub type Binding = (Arc<dyn MetricSource>, Vec<MetricDefinition>);

/// One execution of the collection logic: query every bound source through
/// the pool, join the results in declared order and offer one sample.
pub struct CollectionRound {
    bindings: Vec<Binding>,
    pool: Arc<WorkerPool>,
    queue: EventQueue,
    failures: IntervalLoggerSafe<Address>,
}

impl CollectionRound {
    pub fn new(bindings: Vec<Binding>, pool: Arc<WorkerPool>, queue: EventQueue) -> Self {
        Self {
            bindings,
            pool,
            queue,
            failures: IntervalLoggerSafe::new(FAILURES_LOG_INTERVAL_MS, Level::Warn),
        }
    }

    /// # Errors
    /// Fails if a task can't be submitted or the sample doesn't fit the queue.
    /// A failing source is not an error of the round.
    pub async fn run(&self) -> Result<RoundReport, Error> {
        let mut aggregator = EventAggregator::begin();
        let mut pending = Vec::with_capacity(self.bindings.len());
        for (source, definitions) in &self.bindings {
            let task = SourceQueryTask::new(source.clone(), definitions.clone())?;
            pending.push((source.address().clone(), self.pool.submit(task)?));
        }
        for (address, handle) in pending {
            match handle.await {
                Ok(Ok(props)) => aggregator.record(address, props),
                Ok(Err(e)) if e.is_cancelled() => {
                    info!("source {}: no result for now", address);
                    aggregator.record_missing(address);
                }
                Ok(Err(e)) => {
                    counter!(SOURCES_FAILED_COUNTER, 1);
                    self.failures
                        .report_with_detail(address.clone(), format!("query failed: {}", e));
                    aggregator.record_failure(address);
                }
                Err(e) if e.is_cancelled() => {
                    info!("source {}: query task cancelled, no result for now", address);
                    aggregator.record_missing(address);
                }
                Err(e) => {
                    counter!(SOURCES_FAILED_COUNTER, 1);
                    self.failures
                        .report_with_detail(address.clone(), format!("task aborted: {}", e));
                    aggregator.record_failure(address);
                }
            }
        }
        let report = RoundReport {
            sources_queried: aggregator.sources(),
            sources_failed: aggregator.failed(),
            sources_missing: aggregator.missing(),
        };
        let sample = aggregator.finish();
        if let Err(e) = self.queue.offer(Event::Data(sample)) {
            if e.is_queue_full() {
                counter!(EVENTS_DROPPED_COUNTER, 1);
                warn!("queue is full ({} events), sample dropped", self.queue.len());
            }
            return Err(e);
        }
        gauge!(QUEUE_DEPTH, self.queue.len() as f64);
        Ok(report)
    }
}

impl Debug for CollectionRound {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let addresses: Vec<_> = self.bindings.iter().map(|(s, _)| s.address()).collect();
        f.debug_struct("CollectionRound")
            .field("sources", &addresses)
            .field("pool", &self.pool)
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockall::mock;
    use pulse_sources::{MemSource, RunState};

    mock! {
        pub Source {}

        #[async_trait]
        impl MetricSource for Source {
            fn address(&self) -> &Address;
            fn state(&self) -> SourceState;
            async fn start(&self) -> Result<(), Error>;
            async fn stop(&self) -> Result<(), Error>;
            async fn query(&self, definitions: &[MetricDefinition]) -> Result<Vec<Property>, Error>;
        }
    }

    impl Debug for MockSource {
        fn fmt(&self, f: &mut Formatter) -> FmtResult {
            f.debug_struct("MockSource").finish()
        }
    }

    /// Source whose query panics.
    #[derive(Debug)]
    pub(crate) struct PanickingSource {
        address: Address,
    }

    impl PanickingSource {
        pub(crate) fn new(address: &str) -> Self {
            Self {
                address: address.into(),
            }
        }
    }

    #[async_trait]
    impl MetricSource for PanickingSource {
        fn address(&self) -> &Address {
            &self.address
        }

        fn state(&self) -> SourceState {
            SourceState::Started
        }

        async fn start(&self) -> Result<(), Error> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), Error> {
            Ok(())
        }

        async fn query(&self, _: &[MetricDefinition]) -> Result<Vec<Property>, Error> {
            panic!("driver crashed")
        }
    }

    /// Source whose query takes `delay` and then returns `value` for every definition.
    #[derive(Debug)]
    pub(crate) struct SlowSource {
        address: Address,
        delay: Duration,
        state: RunState,
    }

    impl SlowSource {
        pub(crate) fn new(address: &str, delay: Duration) -> Self {
            Self {
                address: address.into(),
                delay,
                state: RunState::new(),
            }
        }
    }

    #[async_trait]
    impl MetricSource for SlowSource {
        fn address(&self) -> &Address {
            &self.address
        }

        fn state(&self) -> SourceState {
            self.state.get()
        }

        async fn start(&self) -> Result<(), Error> {
            self.state.start();
            Ok(())
        }

        async fn stop(&self) -> Result<(), Error> {
            self.state.set(SourceState::Stopped);
            Ok(())
        }

        async fn query(&self, definitions: &[MetricDefinition]) -> Result<Vec<Property>, Error> {
            tokio::time::sleep(self.delay).await;
            Ok(definitions
                .iter()
                .map(|d| Property::for_definition(d, 1_i64))
                .collect())
        }
    }

    pub(crate) async fn mem(address: &str, values: &[(&str, i64)]) -> Arc<MemSource> {
        let source = Arc::new(MemSource::new(address));
        for (id, value) in values {
            source.set(*id, *value).await;
        }
        source
    }

    fn binding(source: Arc<dyn MetricSource>, ids: &[&str]) -> Binding {
        let defs = ids
            .iter()
            .map(|id| MetricDefinition::new(*id, source.address().clone()))
            .collect();
        (source, defs)
    }

    fn round(bindings: Vec<Binding>, queue: &EventQueue) -> CollectionRound {
        let pool = Arc::new(WorkerPool::new(bindings.len().max(2), None));
        CollectionRound::new(bindings, pool, queue.clone())
    }

    fn take_sample(queue: &EventQueue) -> Sample {
        match queue.try_take() {
            Some(Event::Data(sample)) => sample,
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_round_without_definitions() {
        let queue = EventQueue::new(4);
        let report = round(vec![], &queue).run().await.unwrap();
        assert_eq!(report, RoundReport::default());
        let sample = take_sample(&queue);
        assert_eq!(sample.properties().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_source_does_not_spoil_round() {
        let queue = EventQueue::new(4);
        let a = mem("mem://a", &[("temp", 10)]).await;
        let bindings = vec![
            binding(a, &["temp"]),
            binding(Arc::new(PanickingSource::new("mock://b")), &["temp"]),
        ];
        let report = round(bindings, &queue).run().await.unwrap();
        assert_eq!(report.sources_queried, 2);
        assert_eq!(report.sources_failed, 1);
        let sample = take_sample(&queue);
        assert_eq!(sample.properties().len(), 2);
        assert_eq!(
            sample.property("mem://a:temp").unwrap().value(),
            &PropertyValue::Integer(10)
        );
        assert_eq!(sample.group(&Address::from("mock://b")), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_repeated_failures_are_collapsed_per_source() {
        let queue = EventQueue::new(8);
        let bindings = vec![binding(Arc::new(PanickingSource::new("mock://b")), &["temp"])];
        let round = round(bindings, &queue);
        for _ in 0..3 {
            round.run().await.unwrap();
        }
        assert_eq!(round.failures.pending(&Address::from("mock://b")), 2);
    }

    #[tokio::test]
    async fn test_declared_order_wins_over_completion_order() {
        let queue = EventQueue::new(4);
        let slow: Arc<dyn MetricSource> =
            Arc::new(SlowSource::new("slow://a", Duration::from_millis(50)));
        let fast = mem("mem://b", &[("temp", 20)]).await;
        let bindings = vec![binding(slow, &["temp"]), binding(fast, &["temp"])];
        round(bindings, &queue).run().await.unwrap();
        let sample = take_sample(&queue);
        let names: Vec<_> = sample.column_names().skip(1).collect();
        assert_eq!(names, vec!["slow://a:temp", "mem://b:temp"]);
    }

    #[tokio::test]
    async fn test_full_queue_fails_round() {
        let queue = EventQueue::new(1);
        let a = mem("mem://a", &[("temp", 10)]).await;
        let round = round(vec![binding(a, &["temp"])], &queue);
        round.run().await.unwrap();
        assert!(round.run().await.unwrap_err().is_queue_full());
        assert_eq!(queue.len(), 1);
        take_sample(&queue);
        round.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_source_failing_to_start_is_retried_next_round() {
        let queue = EventQueue::new(4);
        let a = mem("mem://a", &[("temp", 10)]).await;
        a.set_unavailable(true);
        let round = round(vec![binding(a.clone(), &["temp"])], &queue);

        let report = round.run().await.unwrap();
        assert_eq!(report.sources_failed, 1);
        assert_eq!(take_sample(&queue).properties().len(), 1);

        a.set_unavailable(false);
        let report = round.run().await.unwrap();
        assert_eq!(report.sources_failed, 0);
        assert!(take_sample(&queue).property("temp").is_some());
    }

    #[tokio::test]
    async fn test_mock_source_is_started_once() {
        let queue = EventQueue::new(4);
        let mut source = MockSource::new();
        source
            .expect_address()
            .return_const(Address::from("mock://a"));
        let mut seq = mockall::Sequence::new();
        source
            .expect_state()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(SourceState::NotStarted);
        source
            .expect_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        source
            .expect_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|defs| Ok(vec![Property::for_definition(&defs[0], 1.5)]));
        let bindings = vec![binding(Arc::new(source), &["load"])];
        round(bindings, &queue).run().await.unwrap();
        let sample = take_sample(&queue);
        assert_eq!(
            sample.property("load").unwrap().value(),
            &PropertyValue::Float(1.5)
        );
    }
}
