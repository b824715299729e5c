pub mod core;
pub mod factory;
pub mod mem_source;
pub mod os_source;
pub mod stub_source;


#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

pub(crate) mod prelude {
    pub use anyhow::{anyhow, Context, Result as AnyResult};
    pub use pulse_common::{
        configs::SourceConfig,
        data::{MetricDefinition, Property, PropertyValue},
        error::Error,
        name_types::Address,
    };
    pub use std::{
        collections::HashMap,
        fmt::{Debug, Formatter, Result as FmtResult},
        sync::{
            atomic::{AtomicBool, AtomicU8, Ordering},
            Arc,
        },
    };
    pub use tokio::sync::RwLock;
}

pub use crate::{
    core::{MetricSource, RunState, SourceState},
    factory::SourceFactory,
    mem_source::MemSource,
    os_source::OsSource,
    stub_source::StubSource,
};
