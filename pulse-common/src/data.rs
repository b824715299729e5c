use crate::name_types::{Address, MetricId};
use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Metric identifier bound to exactly one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDefinition {
    id: MetricId,
    address: Address,
    unit: Option<String>,
}

impl MetricDefinition {
    pub fn new(id: impl Into<MetricId>, address: impl Into<Address>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            unit: None,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn id(&self) -> &MetricId {
        &self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

/// Configured definitions in declared order.
///
/// Addresses are ordered by the first definition bound to them, which is the
/// order groups appear in every aggregated sample.
#[derive(Debug, Clone, Default)]
pub struct MetricPlan {
    definitions: Vec<MetricDefinition>,
}

impl MetricPlan {
    pub fn new(definitions: Vec<MetricDefinition>) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn for_address(&self, address: &Address) -> Vec<MetricDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.address() == address)
            .cloned()
            .collect()
    }

    /// Distinct addresses having at least one definition.
    pub fn addresses(&self) -> Vec<Address> {
        let mut res: Vec<Address> = Vec::new();
        for def in &self.definitions {
            if !res.contains(def.address()) {
                res.push(def.address().clone());
            }
        }
        res
    }

    pub fn grouped(&self) -> Vec<(Address, Vec<MetricDefinition>)> {
        self.addresses()
            .into_iter()
            .map(|address| {
                let defs = self.for_address(&address);
                (address, defs)
            })
            .collect()
    }
}

impl From<Vec<MetricDefinition>> for MetricPlan {
    fn from(definitions: Vec<MetricDefinition>) -> Self {
        Self::new(definitions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyType {
        match self {
            Self::Integer(_) => PropertyType::Integer,
            Self::Float(_) => PropertyType::Float,
            Self::Text(_) => PropertyType::Text,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::Timestamp(_) => PropertyType::Timestamp,
        }
    }

    /// Numeric view of the value, used by line-oriented forwarders.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Timestamp(ts) => Some(ts.timestamp() as f64),
            Self::Text(_) => None,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// Result of querying one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    value: PropertyValue,
    unit: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            unit: None,
        }
    }

    /// Property named after the definition, carrying its unit.
    pub fn for_definition(definition: &MetricDefinition, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: definition.id().to_string(),
            value: value.into(),
            unit: definition.unit().map(str::to_owned),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn kind(&self) -> PropertyType {
        self.value.kind()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub(crate) fn qualified(&self, address: &Address) -> Self {
        Self {
            name: format!("{}:{}", address, self.name),
            value: self.value.clone(),
            unit: self.unit.clone(),
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.unit {
            Some(unit) => write!(f, "{}={}{}", self.name, self.value, unit),
            None => write!(f, "{}={}", self.name, self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_takes_definition_unit() {
        let def = MetricDefinition::new("used_ram", "os://localhost").with_unit("bytes");
        let prop = Property::for_definition(&def, 42_i64);
        assert_eq!(prop.name(), "used_ram");
        assert_eq!(prop.unit(), Some("bytes"));
        assert_eq!(prop.kind(), PropertyType::Integer);
    }

    #[test]
    fn test_qualified_name() {
        let prop = Property::new("temp", 10_i64);
        let qualified = prop.qualified(&Address::from("mem://a"));
        assert_eq!(qualified.name(), "mem://a:temp");
        assert_eq!(qualified.value(), prop.value());
    }

    #[test]
    fn test_plan_groups_in_declared_order() {
        let plan = MetricPlan::new(vec![
            MetricDefinition::new("temp", "mem://b"),
            MetricDefinition::new("temp", "mem://a"),
            MetricDefinition::new("load", "mem://b"),
        ]);
        let grouped = plan.grouped();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "mem://b");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "mem://a");
        assert!(plan.for_address(&Address::from("mem://c")).is_empty());
    }

    #[test]
    fn test_value_from_yaml() {
        let v: PropertyValue = serde_yaml::from_str("10").unwrap();
        assert_eq!(v, PropertyValue::Integer(10));
        let v: PropertyValue = serde_yaml::from_str("1.5").unwrap();
        assert_eq!(v, PropertyValue::Float(1.5));
        let v: PropertyValue = serde_yaml::from_str("up").unwrap();
        assert_eq!(v, PropertyValue::Text("up".to_string()));
    }
}
