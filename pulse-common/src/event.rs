use crate::{data::Property, name_types::Address};
use chrono::{DateTime, Utc};

/// Name of the synthetic property that opens every sample.
pub const TIMESTAMP_PROPERTY: &str = "timestamp";

/// Item carried by the event queue.
#[derive(Debug, Clone)]
pub enum Event {
    Data(Sample),
    /// No more data will follow; the consumer that takes it shuts down.
    Shutdown,
}

impl Event {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

/// Aggregated result of one collection round.
///
/// Groups keep the declared source order. The flattened view starts with the
/// timestamp property, followed by every group in order. When more than one
/// source took part in the round each name is prefixed with `<address>:`, so
/// names in the flattened view never collide. A source property named like the
/// timestamp is always prefixed.
#[derive(Debug, Clone)]
pub struct Sample {
    timestamp: DateTime<Utc>,
    groups: Vec<(Address, Vec<Property>)>,
    properties: Vec<Property>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, groups: Vec<(Address, Vec<Property>)>) -> Self {
        let qualify = groups.len() > 1;
        let mut properties =
            Vec::with_capacity(1 + groups.iter().map(|(_, props)| props.len()).sum::<usize>());
        properties.push(Property::new(TIMESTAMP_PROPERTY, timestamp));
        for (address, props) in &groups {
            properties.extend(props.iter().map(|p| {
                // the timestamp column name is reserved
                if qualify || p.name() == TIMESTAMP_PROPERTY {
                    p.qualified(address)
                } else {
                    p.clone()
                }
            }));
        }
        Self {
            timestamp,
            groups,
            properties,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Flattened view, in stable column order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Per-source grouping, unqualified.
    pub fn groups(&self) -> &[(Address, Vec<Property>)] {
        &self.groups
    }

    pub fn group(&self, address: &Address) -> Option<&[Property]> {
        self.groups
            .iter()
            .find(|(a, _)| a == address)
            .map(|(_, props)| props.as_slice())
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(Property::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PropertyValue;

    #[test]
    fn test_empty_sample_has_only_timestamp() {
        let sample = Sample::new(Utc::now(), vec![]);
        assert_eq!(sample.properties().len(), 1);
        assert_eq!(sample.properties()[0].name(), TIMESTAMP_PROPERTY);
    }

    #[test]
    fn test_single_source_is_not_qualified() {
        let a = Address::from("mem://a");
        let sample = Sample::new(Utc::now(), vec![(a, vec![Property::new("temp", 10_i64)])]);
        let names: Vec<_> = sample.column_names().collect();
        assert_eq!(names, vec![TIMESTAMP_PROPERTY, "temp"]);
    }

    #[test]
    fn test_many_sources_are_qualified_in_declared_order() {
        let a = Address::from("mem://a");
        let b = Address::from("mem://b");
        let sample = Sample::new(
            Utc::now(),
            vec![
                (b.clone(), vec![Property::new("temp", 20_i64)]),
                (a.clone(), vec![Property::new("temp", 10_i64), Property::new("rh", 0.4)]),
            ],
        );
        let names: Vec<_> = sample.column_names().collect();
        assert_eq!(
            names,
            vec![TIMESTAMP_PROPERTY, "mem://b:temp", "mem://a:temp", "mem://a:rh"]
        );
        assert!(sample.property("temp").is_none());
        assert_eq!(
            sample.property("mem://a:temp").map(Property::value),
            Some(&PropertyValue::Integer(10))
        );
        assert_eq!(sample.group(&a).map(<[Property]>::len), Some(2));
        assert_eq!(sample.group(&b).unwrap()[0].name(), "temp");
    }

    #[test]
    fn test_source_timestamp_does_not_shadow_sample_timestamp() {
        let a = Address::from("mem://a");
        let props = vec![
            Property::new(TIMESTAMP_PROPERTY, 1_i64),
            Property::new("temp", 10_i64),
        ];
        let sample = Sample::new(Utc::now(), vec![(a.clone(), props)]);
        let names: Vec<_> = sample.column_names().collect();
        assert_eq!(names, vec![TIMESTAMP_PROPERTY, "mem://a:timestamp", "temp"]);
        assert_eq!(sample.group(&a).unwrap()[0].name(), TIMESTAMP_PROPERTY);
    }

    #[test]
    fn test_empty_group_still_counts_for_qualification() {
        let sample = Sample::new(
            Utc::now(),
            vec![
                (Address::from("mem://a"), vec![Property::new("temp", 10_i64)]),
                (Address::from("mem://b"), vec![]),
            ],
        );
        assert!(sample.property("mem://a:temp").is_some());
    }
}
