use crate::prelude::*;

use crate::{core::MetricSource, mem_source::MemSource, os_source::OsSource, stub_source::StubSource};

pub const OS_SCHEME: &str = "os";
pub const MEM_SCHEME: &str = "mem";
pub const STUB_SCHEME: &str = "stub";

type SourceBuilder = Box<dyn Fn(&SourceConfig) -> AnyResult<Arc<dyn MetricSource>> + Send + Sync>;

/// Builds sources from their config, choosing the implementation by address scheme.
pub struct SourceFactory {
    builders: HashMap<String, SourceBuilder>,
}

impl SourceFactory {
    /// Factory without any registered scheme.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, scheme: impl Into<String>, builder: F)
    where
        F: Fn(&SourceConfig) -> AnyResult<Arc<dyn MetricSource>> + Send + Sync + 'static,
    {
        let scheme = scheme.into();
        if self.builders.insert(scheme.clone(), Box::new(builder)).is_some() {
            info!("source builder for scheme {} replaced", scheme);
        }
    }

    pub fn supports(&self, scheme: &str) -> bool {
        self.builders.contains_key(scheme)
    }

    pub fn create(&self, config: &SourceConfig) -> AnyResult<Arc<dyn MetricSource>> {
        let address = config.address();
        let scheme = address
            .scheme()
            .ok_or_else(|| anyhow!("address {} has no scheme", address))?;
        let builder = self
            .builders
            .get(scheme)
            .ok_or_else(|| anyhow!("unknown source scheme {}", scheme))?;
        let source = builder(config).with_context(|| format!("can't create source {}", address))?;
        debug!("source {} created", address);
        Ok(source)
    }
}

impl Default for SourceFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register(OS_SCHEME, |config| {
            Ok(Arc::new(OsSource::new(config.address().clone())) as Arc<dyn MetricSource>)
        });
        factory.register(MEM_SCHEME, |config| {
            Ok(Arc::new(MemSource::from_config(config)) as Arc<dyn MetricSource>)
        });
        factory.register(STUB_SCHEME, |config| {
            Ok(Arc::new(StubSource::new(config.address().clone())) as Arc<dyn MetricSource>)
        });
        factory
    }
}

impl Debug for SourceFactory {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let mut schemes: Vec<_> = self.builders.keys().collect();
        schemes.sort();
        f.debug_struct("SourceFactory")
            .field("schemes", &schemes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemes() {
        let factory = SourceFactory::default();
        let source = factory.create(&SourceConfig::new("stub://a")).unwrap();
        assert_eq!(source.address(), &Address::from("stub://a"));
        assert!(factory.supports(OS_SCHEME));
        assert!(factory.supports(MEM_SCHEME));
    }

    #[test]
    fn test_unknown_scheme_is_error() {
        let factory = SourceFactory::default();
        let err = factory.create(&SourceConfig::new("jmx://host:9999")).unwrap_err();
        assert!(err.to_string().contains("unknown source scheme jmx"));
    }

    #[test]
    fn test_registered_builder_is_used() {
        let mut factory = SourceFactory::empty();
        assert!(factory.create(&SourceConfig::new("stub://a")).is_err());
        factory.register("fixture", |config| {
            Ok(Arc::new(StubSource::new(config.address().clone())) as Arc<dyn MetricSource>)
        });
        assert!(factory.create(&SourceConfig::new("fixture://x")).is_ok());
    }
}
