use crate::prelude::*;

use super::{
    csv::CsvHandler,
    graphite::{GraphiteHandler, DEFAULT_PREFIX},
    logger::LogHandler,
    ActiveConsumer, Consumer,
};
use std::net::SocketAddr;

/// Builds consumers from their config by `kind`.
#[derive(Debug, Clone)]
pub struct ConsumerFactory {
    shutdown_timeout: Duration,
}

impl ConsumerFactory {
    /// `shutdown_timeout` bounds the wait of each consumer for a free queue slot
    /// when it delivers its own shutdown sentinel.
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self { shutdown_timeout }
    }

    pub fn create(&self, config: &ConsumerConfig) -> AnyResult<Box<dyn Consumer>> {
        let kind = config.kind().map_err(|e| anyhow!(e))?;
        let consumer: Box<dyn Consumer> = match kind {
            ConsumerKind::Log => Box::new(ActiveConsumer::new(
                config.name(),
                LogHandler::default(),
                self.shutdown_timeout,
            )),
            ConsumerKind::Csv => {
                let path = config
                    .path()
                    .ok_or_else(|| anyhow!("csv consumer requires 'path'"))?;
                Box::new(ActiveConsumer::new(
                    config.name(),
                    CsvHandler::new(path),
                    self.shutdown_timeout,
                ))
            }
            ConsumerKind::Graphite => {
                let address: SocketAddr = config
                    .address()
                    .ok_or_else(|| anyhow!("graphite consumer requires 'address'"))?
                    .parse()
                    .context("graphite consumer address")?;
                let prefix = config.prefix().unwrap_or(DEFAULT_PREFIX);
                Box::new(ActiveConsumer::new(
                    config.name(),
                    GraphiteHandler::new(address, prefix),
                    self.shutdown_timeout,
                ))
            }
        };
        debug!("consumer {} created", consumer.name());
        Ok(consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::configs::YamlConfig;

    fn config(yaml: &str) -> ConsumerConfig {
        YamlConfig::parse(yaml).unwrap()
    }

    #[test]
    fn test_create_by_kind() {
        let factory = ConsumerFactory::new(Duration::from_secs(1));
        let consumer = factory.create(&config("kind: log")).unwrap();
        assert_eq!(consumer.name(), "log");
        assert!(!consumer.is_started());
        assert!(factory
            .create(&config("kind: graphite\naddress: 127.0.0.1:2003"))
            .is_ok());
    }

    #[test]
    fn test_missing_fields() {
        let factory = ConsumerFactory::new(Duration::from_secs(1));
        assert!(factory.create(&config("kind: csv")).is_err());
        assert!(factory.create(&config("kind: graphite")).is_err());
        assert!(factory.create(&config("kind: kafka")).is_err());
    }

    #[test]
    fn test_bad_graphite_address_names_field() {
        let factory = ConsumerFactory::new(Duration::from_secs(1));
        let err = factory
            .create(&config("kind: graphite\naddress: carbon"))
            .unwrap_err();
        assert!(format!("{:#}", err).starts_with("graphite consumer address"));
    }
}
