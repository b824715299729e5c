#[cfg(test)]
mod tests {
    use crate::configs::{
        agent::{tests::agent_config, AgentConfig, ConsumerKind},
        reader::{Validatable, YamlConfig},
    };
    use std::time::Duration;

    #[test]
    fn test_full_config_is_valid() {
        let s = "
log_config: logger.yaml
sampling_interval: 10s
max_executions: 3
queue_capacity: 8
query_timeout: 500ms
telemetry:
    prometheus: 0.0.0.0:9100
sources:
    - address: os://localhost
    - address: mem://fixture
      values:
          temp: 10
metrics:
    - id: used_ram
      source: os://localhost
      unit: bytes
    - id: temp
      source: mem://fixture
consumers:
    - kind: csv
      path: /tmp/pulse.csv
    - kind: log
";
        let config = AgentConfig::get_from_string(s).unwrap();
        assert_eq!(config.sampling_interval(), Duration::from_secs(10));
        assert_eq!(config.max_executions(), Some(3));
        assert_eq!(config.queue_capacity(), 8);
        assert_eq!(config.pool_size_floor(), 2);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.query_timeout(), Some(Duration::from_millis(500)));
        assert!(config.telemetry().unwrap().prometheus().is_some());
        assert_eq!(config.consumers()[0].kind(), Ok(ConsumerKind::Csv));

        let definitions = config.definitions();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].id(), "used_ram");
        assert_eq!(definitions[0].unit(), Some("bytes"));
        assert_eq!(definitions[1].address(), "mem://fixture");
        assert_eq!(config.sources()[1].values().len(), 1);
    }

    #[test]
    fn test_zero_interval_means_one_shot() {
        let config = agent_config("0s", &[]);
        assert!(config.validate().is_ok());
        assert!(config.sampling_interval().is_zero());
    }

    #[test]
    fn test_metric_with_unknown_source() {
        let s = "
log_config: logger.yaml
sampling_interval: 1s
sources:
    - address: os://localhost
metrics:
    - id: temp
      source: mem://missing
";
        let config: AgentConfig = YamlConfig::parse(s).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("mem://missing"));
    }

    #[test]
    fn test_duplicate_source() {
        let config = agent_config("1s", &["os://localhost", "os://localhost"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_without_scheme() {
        let config = agent_config("1s", &["localhost:9000"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_interval() {
        let config = agent_config("often", &[]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity() {
        let s = "
log_config: logger.yaml
sampling_interval: 1s
queue_capacity: 0
";
        let config: AgentConfig = YamlConfig::parse(s).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_consumer_kind() {
        let s = "
log_config: logger.yaml
sampling_interval: 1s
consumers:
    - kind: kafka
";
        assert!(AgentConfig::get_from_string(s).is_err());
    }

    #[test]
    fn test_graphite_consumer_requires_address() {
        let s = "
log_config: logger.yaml
sampling_interval: 1s
consumers:
    - kind: graphite
      prefix: agent
";
        assert!(AgentConfig::get_from_string(s).is_err());

        let s = "
log_config: logger.yaml
sampling_interval: 1s
consumers:
    - kind: graphite
      address: 127.0.0.1:2003
";
        assert!(AgentConfig::get_from_string(s).is_ok());
    }

    #[test]
    fn test_log_config_is_missing() {
        let s = "
sampling_interval: 1s
";
        assert!(YamlConfig::parse::<AgentConfig>(s).is_err());
    }
}
