use crate::prelude::*;

/// Collects per-source results of one round in declared order and turns them
/// into a single sample.
#[derive(Debug)]
pub struct EventAggregator {
    started: DateTime<Utc>,
    groups: Vec<(Address, Vec<Property>)>,
    failed: usize,
    missing: usize,
}

impl EventAggregator {
    pub fn begin() -> Self {
        Self::started_at(Utc::now())
    }

    pub fn started_at(started: DateTime<Utc>) -> Self {
        Self {
            started,
            groups: Vec::new(),
            failed: 0,
            missing: 0,
        }
    }

    pub fn record(&mut self, address: Address, properties: Vec<Property>) {
        self.groups.push((address, properties));
    }

    /// The source failed this round, it contributes no properties.
    pub fn record_failure(&mut self, address: Address) {
        self.failed += 1;
        self.groups.push((address, Vec::new()));
    }

    /// The result was interrupted before it arrived.
    pub fn record_missing(&mut self, address: Address) {
        self.missing += 1;
        self.groups.push((address, Vec::new()));
    }

    pub fn sources(&self) -> usize {
        self.groups.len()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn missing(&self) -> usize {
        self.missing
    }

    pub fn finish(self) -> Sample {
        self.finish_at(Utc::now())
    }

    /// Builds the sample stamped with the midpoint of round start and `ended`.
    pub fn finish_at(self, ended: DateTime<Utc>) -> Sample {
        Sample::new(midpoint(self.started, ended), self.groups)
    }
}

pub fn midpoint(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    start + (end - start) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use pulse_common::event::TIMESTAMP_PROPERTY;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_no_sources_gives_timestamp_only() {
        let sample = EventAggregator::started_at(at(100)).finish_at(at(102));
        assert_eq!(sample.properties().len(), 1);
        assert_eq!(sample.properties()[0].name(), TIMESTAMP_PROPERTY);
        assert_eq!(sample.timestamp(), at(101));
    }

    #[test]
    fn test_single_source_is_not_qualified() {
        let mut agg = EventAggregator::started_at(at(100));
        agg.record(Address::from("mem://a"), vec![Property::new("temp", 10_i64)]);
        let sample = agg.finish_at(at(100));
        assert_eq!(sample.property("temp").unwrap().value(), &PropertyValue::Integer(10));
    }

    #[test]
    fn test_same_name_from_two_sources_is_qualified() {
        let mut agg = EventAggregator::started_at(at(100));
        agg.record(Address::from("mem://a"), vec![Property::new("temp", 10_i64)]);
        agg.record(Address::from("mem://b"), vec![Property::new("temp", 20_i64)]);
        let sample = agg.finish_at(at(100));
        let names: Vec<_> = sample.column_names().collect();
        assert_eq!(names, vec![TIMESTAMP_PROPERTY, "mem://a:temp", "mem://b:temp"]);
        assert!(sample.property("temp").is_none());
        assert_eq!(
            sample.property("mem://b:temp").unwrap().value(),
            &PropertyValue::Integer(20)
        );
    }

    #[test]
    fn test_failed_source_still_qualifies_others() {
        let mut agg = EventAggregator::started_at(at(100));
        agg.record(Address::from("mem://a"), vec![Property::new("temp", 10_i64)]);
        agg.record_failure(Address::from("mem://b"));
        assert_eq!(agg.failed(), 1);
        let sample = agg.finish_at(at(100));
        assert_eq!(sample.properties().len(), 2);
        assert!(sample.property("mem://a:temp").is_some());
        assert_eq!(sample.group(&Address::from("mem://b")), Some(&[][..]));
    }

    #[test]
    fn test_midpoint() {
        let start = at(0);
        let end = start + ChronoDuration::milliseconds(500);
        assert_eq!(midpoint(start, end), start + ChronoDuration::milliseconds(250));
    }
}
