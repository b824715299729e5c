pub mod configs;
pub mod data;
pub mod error;
pub mod event;
pub mod interval_logger;
pub mod metrics;
pub mod name_types;
pub mod queue;

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate metrics as lib_metrics;
