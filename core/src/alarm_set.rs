//! Ordered set of pending alarm timestamps

use std::collections::BTreeSet;

use crate::types::AlarmTimestamp;

/// Unique alarm timestamps, ordered so the earliest is cheap to find.
///
/// Members are strictly in the future when inserted. Expired members are
/// removed by [`AlarmSet::drain_due`], which only the evaluator calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmSet {
    alarms: BTreeSet<AlarmTimestamp>,
}

impl AlarmSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `ts` if it lies strictly after `now`.
    ///
    /// # Returns
    /// True if the timestamp was newly added.
    pub fn insert_future(&mut self, ts: AlarmTimestamp, now: AlarmTimestamp) -> bool {
        if ts <= now {
            return false;
        }
        self.alarms.insert(ts)
    }

    /// Merge a batch of timestamps, keeping only those still in the future.
    ///
    /// # Returns
    /// Number of timestamps that were not already present.
    pub fn merge<I>(&mut self, timestamps: I, now: AlarmTimestamp) -> usize
    where
        I: IntoIterator<Item = AlarmTimestamp>,
    {
        timestamps
            .into_iter()
            .filter(|&ts| self.insert_future(ts, now))
            .count()
    }

    /// Remove every alarm at or before `now`.
    ///
    /// # Returns
    /// Number of alarms removed.
    pub fn drain_due(&mut self, now: AlarmTimestamp) -> usize {
        match now.checked_add(1) {
            Some(bound) => {
                let later = self.alarms.split_off(&bound);
                std::mem::replace(&mut self.alarms, later).len()
            }
            None => std::mem::take(&mut self.alarms).len(),
        }
    }

    /// True if at least one alarm is at or before `now`.
    pub fn has_due(&self, now: AlarmTimestamp) -> bool {
        self.next().is_some_and(|ts| ts <= now)
    }

    /// Earliest pending alarm.
    pub fn next(&self) -> Option<AlarmTimestamp> {
        self.alarms.first().copied()
    }

    pub fn contains(&self, ts: AlarmTimestamp) -> bool {
        self.alarms.contains(&ts)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AlarmTimestamp> + '_ {
        self.alarms.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_rejects_past_and_present() {
        let mut set = AlarmSet::new();
        assert!(!set.insert_future(99, 100));
        assert!(!set.insert_future(100, 100));
        assert!(set.insert_future(101, 100));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut set = AlarmSet::new();
        assert!(set.insert_future(200, 100));
        assert!(!set.insert_future(200, 100));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_merge_counts_new_future_only() {
        let mut set = AlarmSet::new();
        set.insert_future(300, 100);

        let added = set.merge(vec![50, 100, 150, 300, 400, 400], 100);
        assert_eq!(added, 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![150, 300, 400]);
    }

    #[test]
    fn test_drain_due_is_inclusive() {
        let mut set = AlarmSet::new();
        set.merge(vec![110, 120, 130], 100);

        assert_eq!(set.drain_due(119), 1);
        assert_eq!(set.drain_due(120), 1);
        assert_eq!(set.next(), Some(130));
        assert!(!set.has_due(129));
        assert!(set.has_due(130));
    }

    #[test]
    fn test_drain_due_at_max_time() {
        let mut set = AlarmSet::new();
        set.merge(vec![1, i64::MAX], 0);
        assert_eq!(set.drain_due(i64::MAX), 2);
        assert!(set.is_empty());
    }
}
