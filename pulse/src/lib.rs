#![warn(missing_debug_implementations)]

//! Collection engine of the agent. Library requires tokio runtime.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate metrics;

pub mod aggregator;
pub mod consumer;
pub mod coordinator;
pub mod pool;
pub mod query_task;
pub mod round;
pub mod scheduler;
mod unwind;

pub use crate::{
    consumer::{
        factory::ConsumerFactory, ActiveConsumer, Consumer, EventHandler, PolledConsumer,
    },
    coordinator::{Coordinator, EngineSettings, ExitLatch, Health, ShutdownReport},
    round::RoundReport,
};
pub use pulse_common::metrics::init_counters;

mod prelude {
    pub use anyhow::{anyhow, Context, Result as AnyResult};
    pub use chrono::{DateTime, Utc};
    pub use futures::FutureExt;
    pub use pulse_common::{
        configs::{AgentConfig, ConsumerConfig, ConsumerKind},
        data::{MetricDefinition, MetricPlan, Property, PropertyValue},
        error::Error,
        event::{Event, Sample},
        interval_logger::IntervalLoggerSafe,
        metrics::{
            CONSUMER_ERRORS_COUNTER, EVENTS_DROPPED_COUNTER, QUEUE_DEPTH, ROUNDS_FAILED_COUNTER,
            ROUNDS_SUCCEEDED_COUNTER, ROUNDS_TOTAL_COUNTER, ROUND_TIMER,
            SOURCES_FAILED_COUNTER, SOURCES_START_FAILED_COUNTER,
        },
        name_types::Address,
        queue::EventQueue,
    };
    pub use pulse_sources::{MetricSource, SourceState};
    pub use std::{
        fmt::{Debug, Formatter, Result as FmtResult},
        panic::AssertUnwindSafe,
        sync::{
            atomic::{AtomicBool, AtomicU64, Ordering},
            Arc, Mutex,
        },
        time::{Duration, Instant},
    };
    pub use tokio::{
        sync::{oneshot, watch, Semaphore},
        task::JoinHandle,
        time::interval,
    };
}
