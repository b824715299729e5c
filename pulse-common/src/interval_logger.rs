use coarsetime::{Duration as CDuration, Instant as CInstant};
use log::Level;
use std::{collections::HashMap, fmt::Display, hash::Hash, sync::Mutex};

#[derive(Debug, Default)]
struct Report {
    count: u64,
    detail: Option<String>,
}

/// Collapses repeated reports of the same event into one log line per interval.
///
/// A source that stays down keeps failing every round; logging each failure
/// floods the log, so failures are counted per key and flushed as
/// `"<key> [<n> times]"` once the interval has passed. Only the latest detail
/// of a key is kept, so the number of entries is bounded by the number of keys.
#[derive(Debug)]
pub struct IntervalLogger<E> {
    reports: HashMap<E, Report>,
    interval: CDuration,
    last_timestamp: CInstant,
    level: Level,
}

impl<E: Hash + Eq + Display> IntervalLogger<E> {
    pub fn new(interval_ms: u64, level: Level) -> Self {
        let interval = CDuration::from_millis(interval_ms);
        Self {
            reports: HashMap::new(),
            interval,
            last_timestamp: CInstant::now() - interval - CDuration::from_millis(1),
            level,
        }
    }

    /// Counts the report and returns how many lines were flushed to the log.
    pub fn report(&mut self, event: E) -> usize {
        self.count(event, None)
    }

    /// Same as [`IntervalLogger::report`], `detail` replaces the previous one of `event`.
    pub fn report_with_detail(&mut self, event: E, detail: impl Display) -> usize {
        self.count(event, Some(detail.to_string()))
    }

    fn count(&mut self, event: E, detail: Option<String>) -> usize {
        let report = self.reports.entry(event).or_default();
        report.count += 1;
        if detail.is_some() {
            report.detail = detail;
        }

        if self.last_timestamp.elapsed() <= self.interval {
            return 0;
        }
        let mut flushed = 0;
        for (event, report) in self.reports.iter_mut().filter(|(_, r)| r.count > 0) {
            match &report.detail {
                Some(detail) => log!(
                    self.level,
                    "{} [{} times], last: {}",
                    event,
                    report.count,
                    detail
                ),
                None => log!(self.level, "{} [{} times]", event, report.count),
            }
            report.count = 0;
            flushed += 1;
        }
        self.last_timestamp = CInstant::now();
        flushed
    }

    /// Number of reports of `event` not flushed yet.
    pub fn pending(&self, event: &E) -> u64 {
        self.reports.get(event).map_or(0, |r| r.count)
    }
}

#[derive(Debug)]
pub struct IntervalLoggerSafe<E> {
    inner: Mutex<IntervalLogger<E>>,
}

impl<E: Hash + Eq + Display> IntervalLoggerSafe<E> {
    pub fn new(interval_ms: u64, level: Level) -> Self {
        Self {
            inner: Mutex::new(IntervalLogger::new(interval_ms, level)),
        }
    }

    pub fn report(&self, event: E) {
        self.with(|logger| logger.report(event));
    }

    pub fn report_with_detail(&self, event: E, detail: impl Display) {
        self.with(|logger| logger.report_with_detail(event, detail));
    }

    pub fn pending(&self, event: &E) -> u64 {
        self.with(|logger| logger.pending(event))
    }

    fn with<T>(&self, f: impl FnOnce(&mut IntervalLogger<E>) -> T) -> T {
        match self.inner.lock() {
            Ok(mut logger) => f(&mut logger),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IntervalLogger;
    use log::Level;

    #[test]
    fn test_first_report_is_flushed_then_collapsed() {
        let mut logger = IntervalLogger::new(60_000, Level::Warn);
        assert_eq!(logger.report("source a down"), 1);
        assert_eq!(logger.pending(&"source a down"), 0);
        assert_eq!(logger.report("source a down"), 0);
        assert_eq!(logger.report("source a down"), 0);
        assert_eq!(logger.pending(&"source a down"), 2);
    }

    #[test]
    fn test_varying_details_share_one_entry() {
        let mut logger = IntervalLogger::new(60_000, Level::Warn);
        for i in 0..100 {
            logger.report_with_detail("mem://a", format!("io error #{}", i));
        }
        assert_eq!(logger.reports.len(), 1);
        assert_eq!(logger.pending(&"mem://a"), 99);
        assert_eq!(
            logger.reports["mem://a"].detail.as_deref(),
            Some("io error #99")
        );
    }
}
