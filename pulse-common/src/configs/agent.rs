use super::reader::{Validatable, YamlConfig};
use crate::{
    data::{MetricDefinition, MetricPlan, PropertyValue},
    name_types::{Address, MetricId},
};
use humantime::Duration as HumanDuration;
use std::{
    collections::{BTreeMap, HashSet},
    net::SocketAddr,
    time::Duration,
};

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_POOL_SIZE_FLOOR: usize = 2;
const DEFAULT_SHUTDOWN_TIMEOUT: &str = "5s";
const DEFAULT_POOL_SHUTDOWN_GRACE: &str = "2s";

fn parse_duration(field: &str, value: &str) -> Result<Duration, String> {
    value
        .parse::<HumanDuration>()
        .map(Into::into)
        .map_err(|e| {
            let msg = format!("field '{}' for 'config' is not valid: {}", field, e);
            error!("{}", msg);
            msg
        })
}

/// Source declaration. The scheme of the address selects the implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    address: Address,
    /// Initial values for in-memory sources.
    #[serde(default)]
    values: BTreeMap<String, PropertyValue>,
}

impl SourceConfig {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_values(
        address: impl Into<Address>,
        values: BTreeMap<String, PropertyValue>,
    ) -> Self {
        Self {
            address: address.into(),
            values,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn values(&self) -> &BTreeMap<String, PropertyValue> {
        &self.values
    }
}

impl Validatable for SourceConfig {
    fn validate(&self) -> Result<(), String> {
        if self.address.scheme().is_none() {
            let msg = format!(
                "source address '{}' must look like 'scheme://location'",
                self.address
            );
            error!("{}", msg);
            Err(msg)
        } else {
            Ok(())
        }
    }
}

/// Metric bound to one configured source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    id: MetricId,
    source: Address,
    unit: Option<String>,
}

impl MetricConfig {
    pub fn definition(&self) -> MetricDefinition {
        let definition = MetricDefinition::new(self.id.clone(), self.source.clone());
        match &self.unit {
            Some(unit) => definition.with_unit(unit.clone()),
            None => definition,
        }
    }
}

impl Validatable for MetricConfig {
    fn validate(&self) -> Result<(), String> {
        if self.id.as_str().is_empty() {
            let msg = format!("metric bound to '{}' has an empty id", self.source);
            error!("{}", msg);
            Err(msg)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerKind {
    Log,
    Csv,
    Graphite,
}

/// Output sink declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    kind: String,
    path: Option<String>,
    address: Option<String>,
    prefix: Option<String>,
}

impl ConsumerConfig {
    pub fn kind(&self) -> Result<ConsumerKind, String> {
        match self.kind.as_str() {
            "log" => Ok(ConsumerKind::Log),
            "csv" => Ok(ConsumerKind::Csv),
            "graphite" => Ok(ConsumerKind::Graphite),
            value => Err(format!("unknown consumer kind: {}", value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.kind
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

impl Validatable for ConsumerConfig {
    fn validate(&self) -> Result<(), String> {
        let kind = self.kind().map_err(|e| {
            error!("{}", e);
            e
        })?;
        match kind {
            ConsumerKind::Csv if self.path.as_deref().map_or(true, str::is_empty) => {
                let msg = "field 'path' for 'csv consumer' is empty".to_string();
                error!("{}", msg);
                Err(msg)
            }
            ConsumerKind::Graphite => match self.address.as_deref().map(str::parse::<SocketAddr>) {
                Some(Ok(_)) => Ok(()),
                Some(Err(e)) => {
                    let msg = format!("field 'address' for 'graphite consumer' is invalid: {}", e);
                    error!("{}", msg);
                    Err(msg)
                }
                None => {
                    let msg = "field 'address' for 'graphite consumer' is not set".to_string();
                    error!("{}", msg);
                    Err(msg)
                }
            },
            _ => Ok(()),
        }
    }
}

/// Self-telemetry endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    prometheus: Option<String>,
}

impl TelemetryConfig {
    pub fn prometheus(&self) -> Option<SocketAddr> {
        self.prometheus.as_deref().and_then(|a| a.parse().ok())
    }
}

impl Validatable for TelemetryConfig {
    fn validate(&self) -> Result<(), String> {
        match self.prometheus.as_deref().map(str::parse::<SocketAddr>) {
            Some(Err(e)) => {
                let msg = format!("field 'prometheus' for 'telemetry config' is invalid: {}", e);
                error!("{}", msg);
                Err(msg)
            }
            _ => Ok(()),
        }
    }
}

/// Agent configuration struct, stored in agent.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    log_config: String,
    sampling_interval: String,
    max_executions: Option<u64>,
    #[serde(default = "AgentConfig::default_queue_capacity")]
    queue_capacity: usize,
    #[serde(default = "AgentConfig::default_pool_size_floor")]
    pool_size_floor: usize,
    #[serde(default = "AgentConfig::default_shutdown_timeout")]
    shutdown_timeout: String,
    #[serde(default = "AgentConfig::default_pool_shutdown_grace")]
    pool_shutdown_grace: String,
    query_timeout: Option<String>,
    telemetry: Option<TelemetryConfig>,
    #[serde(default)]
    sources: Vec<SourceConfig>,
    #[serde(default)]
    metrics: Vec<MetricConfig>,
    #[serde(default)]
    consumers: Vec<ConsumerConfig>,
}

impl AgentConfig {
    /// Reads, parses and validates config file.
    /// # Errors
    /// Returns description of the first problem found.
    pub fn try_get(filename: &str) -> Result<Self, String> {
        YamlConfig::get(filename)
    }

    pub fn get_from_string(file: &str) -> Result<Self, String> {
        let config = YamlConfig::parse_valid::<Self>(file)?;
        debug!("config: {:?}", config);
        Ok(config)
    }

    /// Get log config file path.
    pub fn log_config(&self) -> &str {
        &self.log_config
    }

    /// Zero means a single round.
    pub fn sampling_interval(&self) -> Duration {
        parse_duration("sampling_interval", &self.sampling_interval).unwrap_or_default()
    }

    pub fn max_executions(&self) -> Option<u64> {
        self.max_executions
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn pool_size_floor(&self) -> usize {
        self.pool_size_floor
    }

    /// Bounded wait for delivering the shutdown sentinel.
    pub fn shutdown_timeout(&self) -> Duration {
        parse_duration("shutdown_timeout", &self.shutdown_timeout)
            .unwrap_or_else(|_| Duration::from_secs(5))
    }

    pub fn pool_shutdown_grace(&self) -> Duration {
        parse_duration("pool_shutdown_grace", &self.pool_shutdown_grace)
            .unwrap_or_else(|_| Duration::from_secs(2))
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
            .as_deref()
            .and_then(|t| parse_duration("query_timeout", t).ok())
    }

    pub fn telemetry(&self) -> Option<&TelemetryConfig> {
        self.telemetry.as_ref()
    }

    /// Sources in declared order.
    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    pub fn consumers(&self) -> &[ConsumerConfig] {
        &self.consumers
    }

    /// Full definition list in declared order.
    pub fn definitions(&self) -> Vec<MetricDefinition> {
        self.metrics.iter().map(MetricConfig::definition).collect()
    }

    pub fn plan(&self) -> MetricPlan {
        MetricPlan::new(self.definitions())
    }

    fn default_queue_capacity() -> usize {
        DEFAULT_QUEUE_CAPACITY
    }

    fn default_pool_size_floor() -> usize {
        DEFAULT_POOL_SIZE_FLOOR
    }

    fn default_shutdown_timeout() -> String {
        DEFAULT_SHUTDOWN_TIMEOUT.to_string()
    }

    fn default_pool_shutdown_grace() -> String {
        DEFAULT_POOL_SHUTDOWN_GRACE.to_string()
    }

    fn check_durations(&self) -> Result<(), String> {
        parse_duration("sampling_interval", &self.sampling_interval)?;
        parse_duration("shutdown_timeout", &self.shutdown_timeout)?;
        parse_duration("pool_shutdown_grace", &self.pool_shutdown_grace)?;
        if let Some(timeout) = &self.query_timeout {
            let timeout = parse_duration("query_timeout", timeout)?;
            if timeout.is_zero() {
                let msg = "field 'query_timeout' for 'config' must be greater than 0".to_string();
                error!("{}", msg);
                return Err(msg);
            }
        }
        Ok(())
    }

    fn check_sources(&self) -> Result<(), String> {
        Self::aggregate(&self.sources)?;
        let mut uniq = HashSet::new();
        for source in &self.sources {
            if !uniq.insert(source.address()) {
                let msg = format!("source '{}' is declared twice", source.address());
                error!("{}", msg);
                return Err(msg);
            }
        }
        Ok(())
    }

    fn check_metrics(&self) -> Result<(), String> {
        Self::aggregate(&self.metrics)?;
        let addresses: HashSet<_> = self.sources.iter().map(SourceConfig::address).collect();
        let unresolved = self
            .metrics
            .iter()
            .filter(|m| !addresses.contains(&m.source))
            .map(|m| format!("metric '{}' refers to unknown source '{}'", m.id, m.source))
            .collect::<Vec<_>>();
        if unresolved.is_empty() {
            Ok(())
        } else {
            let msg = unresolved.join("\n");
            error!("{}", msg);
            Err(msg)
        }
    }
}

impl Validatable for AgentConfig {
    fn validate(&self) -> Result<(), String> {
        if self.log_config.is_empty() {
            let msg = "field 'log_config' for 'config' is empty".to_string();
            error!("{}", msg);
            return Err(msg);
        }
        if self.queue_capacity == 0 {
            let msg = "field 'queue_capacity' for 'config' must be greater than 0".to_string();
            error!("{}", msg);
            return Err(msg);
        }
        if self.pool_size_floor == 0 {
            let msg = "field 'pool_size_floor' for 'config' must be greater than 0".to_string();
            error!("{}", msg);
            return Err(msg);
        }
        if self.max_executions == Some(0) {
            let msg = "field 'max_executions' for 'config' must be greater than 0".to_string();
            error!("{}", msg);
            return Err(msg);
        }
        self.check_durations()?;
        self.check_sources()?;
        self.check_metrics()?;
        Self::aggregate(&self.consumers)?;
        self.telemetry
            .as_ref()
            .map_or(Ok(()), Validatable::validate)
    }
}

pub mod tests {
    use super::{AgentConfig, SourceConfig};

    pub fn agent_config(sampling_interval: &str, sources: &[&str]) -> AgentConfig {
        AgentConfig {
            log_config: "logger.yaml".to_string(),
            sampling_interval: sampling_interval.to_string(),
            max_executions: None,
            queue_capacity: super::DEFAULT_QUEUE_CAPACITY,
            pool_size_floor: super::DEFAULT_POOL_SIZE_FLOOR,
            shutdown_timeout: super::DEFAULT_SHUTDOWN_TIMEOUT.to_string(),
            pool_shutdown_grace: super::DEFAULT_POOL_SHUTDOWN_GRACE.to_string(),
            query_timeout: None,
            telemetry: None,
            sources: sources.iter().map(|a| SourceConfig::new(*a)).collect(),
            metrics: vec![],
            consumers: vec![],
        }
    }
}
