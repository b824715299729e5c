//! Queue consumers.
//!
//! [`ActiveConsumer`] owns a task draining the queue into an [`EventHandler`]
//! until it takes the shutdown sentinel. [`PolledConsumer`] is drained by its
//! owner instead.

use crate::prelude::*;

pub mod active;
pub mod csv;
pub mod factory;
pub mod graphite;
pub mod logger;
pub mod polled;
mod retry_socket;

pub use self::{active::ActiveConsumer, polled::PolledConsumer};

#[async_trait]
pub trait Consumer: Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Attaches the shared queue. Called once, before `start`.
    fn set_queue(&mut self, queue: EventQueue);

    async fn start(&self) -> Result<(), Error>;

    /// Requests shutdown, does not wait for the queue to be drained.
    async fn stop(&self) -> Result<(), Error>;

    fn is_started(&self) -> bool;
}

/// Output side of an active consumer.
#[async_trait]
pub trait EventHandler: Send + 'static {
    async fn handle(&mut self, sample: &Sample) -> Result<(), Error>;

    /// Called once the shutdown sentinel was taken, after the consumer
    /// already reports itself stopped.
    async fn on_shutdown(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
