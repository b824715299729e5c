use crate::prelude::*;

use crate::core::{check_query, MetricSource, RunState, SourceState};

/// Source that knows no metrics at all.
#[derive(Debug)]
pub struct StubSource {
    address: Address,
    state: RunState,
}

impl StubSource {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            state: RunState::new(),
        }
    }
}

#[async_trait]
impl MetricSource for StubSource {
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
        check_query(&self.address, self.state.get(), definitions)?;
        debug!("QUERY[{}]: hi from stub source", self.address);
        Ok(vec![])
    }
}
