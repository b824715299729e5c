use crate::prelude::*;

use super::EventHandler;
use ::log::Level;

/// Writes every sample to the log.
#[derive(Debug)]
pub struct LogHandler {
    level: Level,
    handled: u64,
}

impl LogHandler {
    pub fn new(level: Level) -> Self {
        Self { level, handled: 0 }
    }
}

impl Default for LogHandler {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

#[async_trait]
impl EventHandler for LogHandler {
    async fn handle(&mut self, sample: &Sample) -> Result<(), Error> {
        self.handled += 1;
        let line = sample
            .properties()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        log!(self.level, "sample #{}: {}", self.handled, line);
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<(), Error> {
        info!("{} samples logged", self.handled);
        Ok(())
    }
}
