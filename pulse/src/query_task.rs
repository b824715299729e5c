use crate::prelude::*;

use crate::unwind::panic_message;

/// Query of one source for the definitions bound to it, run on the worker pool.
pub struct SourceQueryTask {
    source: Arc<dyn MetricSource>,
    definitions: Vec<MetricDefinition>,
}

impl SourceQueryTask {
    /// # Errors
    /// `MisboundDefinition` if any definition is bound to another address.
    pub fn new(
        source: Arc<dyn MetricSource>,
        definitions: Vec<MetricDefinition>,
    ) -> Result<Self, Error> {
        if let Some(def) = definitions
            .iter()
            .find(|def| def.address() != source.address())
        {
            error!(
                "definition {} is bound to {}, not to {}",
                def.id(),
                def.address(),
                source.address()
            );
            return Err(Error::misbound_definition(source.address(), def.address()));
        }
        Ok(Self {
            source,
            definitions,
        })
    }

    pub fn address(&self) -> &Address {
        self.source.address()
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    /// Starts the source if needed and queries it. A panic inside the source
    /// is returned as `SourceFailed` of that source.
    pub async fn run(self) -> Result<Vec<Property>, Error> {
        let address = self.address().clone();
        match AssertUnwindSafe(self.execute()).catch_unwind().await {
            Ok(res) => res,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!("source {} panicked: {}", address, msg);
                Err(Error::source_failed(&address, format!("panicked: {}", msg)))
            }
        }
    }

    async fn execute(&self) -> Result<Vec<Property>, Error> {
        if self.source.state() != SourceState::Started {
            if let Err(e) = self.source.start().await {
                counter!(SOURCES_START_FAILED_COUNTER, 1);
                debug!("source {} failed to start: {}", self.address(), e);
                return Err(if e.is_source_failure() {
                    e
                } else {
                    Error::source_failed(self.address(), format!("can't start: {}", e))
                });
            }
            info!("source {} started", self.address());
        }
        self.source.query(&self.definitions).await
    }
}

impl Debug for SourceQueryTask {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("SourceQueryTask")
            .field("address", self.address())
            .field("definitions", &self.definitions.len())
            .finish()
    }
}
