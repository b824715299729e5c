use crate::prelude::*;

use crate::core::{check_query, MetricSource, RunState, SourceState};

/// Source keeping its values in memory.
///
/// Values come from the `values` map of the source config or are set at
/// runtime. While marked unavailable both `start` and `query` fail, which
/// mimics an unreachable remote endpoint.
pub struct MemSource {
    address: Address,
    values: RwLock<HashMap<String, PropertyValue>>,
    state: RunState,
    unavailable: AtomicBool,
}

impl MemSource {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            values: RwLock::new(HashMap::new()),
            state: RunState::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        let values = config
            .values()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            values: RwLock::new(values),
            ..Self::new(config.address().clone())
        }
    }

    pub async fn set(&self, id: impl Into<String>, value: impl Into<PropertyValue>) {
        let id = id.into();
        debug!("SET[{}] on {}", id, self.address);
        self.values.write().await.insert(id, value.into());
    }

    pub async fn remove(&self, id: &str) -> Option<PropertyValue> {
        self.values.write().await.remove(id)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    fn check_available(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::Acquire) {
            Err(Error::source_failed(&self.address, "endpoint unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Debug for MemSource {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.debug_struct("MemSource")
            .field("address", &self.address)
            .field("state", &self.state.get())
            .finish()
    }
}

#[async_trait]
impl MetricSource for MemSource {
    fn address(&self) -> &Address {
        &self.address
    }

    fn state(&self) -> SourceState {
        self.state.get()
    }

    async fn start(&self) -> Result<(), Error> {
        self.check_available()?;
        if self.state.start() {
            debug!("{} started", self.address);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), Error> {
        self.state.set(SourceState::Stopped);
        debug!("{} stopped", self.address);
        Ok(())
    }

    async fn query(&self, definitions: &[MetricDefinition]) -> Result<Vec<Property>, Error> {
        check_query(&self.address, self.state.get(), definitions)?;
        self.check_available()?;
        let values = self.values.read().await;
        let props = definitions
            .iter()
            .filter_map(|def| match values.get(def.id().as_str()) {
                Some(value) => Some(Property::for_definition(def, value.clone())),
                None => {
                    debug!("GET[{}] from {} failed. No value", def.id(), self.address);
                    None
                }
            })
            .collect();
        Ok(props)
    }
}
