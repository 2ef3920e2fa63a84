use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// Visits of one post on one day. `total` counts every hit, `unique_total`
/// only the first hit per origin.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DayBucket {
    pub slug: String,
    pub total: u64,
    pub unique_total: u64,
    pub origins: HashSet<String>,
    pub date: NaiveDate,
}

/// Per-slug visit counters with day-bucket rollover. Buckets of a finished
/// day collect in a history list until they are taken for publishing.
pub struct VisitCounter {
    buckets: HashMap<String, DayBucket>,
    finished: Vec<DayBucket>,
    date_provider: Box<dyn Fn() -> NaiveDate + Send>,
}

impl VisitCounter {
    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            finished: vec![],
            date_provider: Box::new(|| Utc::now().date_naive()),
        }
    }

    #[cfg(test)]
    pub fn with_date_provider(date_provider: Box<dyn Fn() -> NaiveDate + Send>) -> Self {
        Self {
            buckets: Default::default(),
            finished: vec![],
            date_provider,
        }
    }

    pub fn record(&mut self, slug: &str, origin: &str) {
        let today = (self.date_provider)();

        if let Some(bucket) = self.buckets.get_mut(slug) {
            if bucket.date == today {
                bucket.total += 1;
                if bucket.origins.insert(origin.to_string()) {
                    bucket.unique_total += 1;
                }
                return;
            }

            // Day rolled over for this slug
            let expired = self.buckets.remove(slug).unwrap();
            self.finished.push(expired);
        }

        let mut origins = HashSet::new();
        origins.insert(origin.to_string());
        self.buckets.insert(
            slug.to_string(),
            DayBucket {
                slug: slug.to_string(),
                total: 1,
                unique_total: 1,
                origins,
                date: today,
            },
        );
    }

    /// Moves every bucket belonging to a previous day into the history list.
    pub fn roll_over(&mut self) {
        let today = (self.date_provider)();
        let expired: Vec<String> = self
            .buckets
            .iter()
            .filter(|(_, bucket)| bucket.date != today)
            .map(|(slug, _)| slug.clone())
            .collect();

        for slug in expired {
            let bucket = self.buckets.remove(&slug).unwrap();
            self.finished.push(bucket);
        }
    }

    pub fn take_finished(&mut self) -> Option<Vec<DayBucket>> {
        if self.finished.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.finished))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counts_unique_and_total_visits() {
        let mut counter = VisitCounter::new();
        counter.record("hello-world", "1.2.3.4");
        counter.record("hello-world", "1.2.3.4");
        counter.record("hello-world", "5.6.7.8");

        let bucket = counter.buckets.get("hello-world").unwrap();
        assert_eq!(bucket.total, 3);
        assert_eq!(bucket.unique_total, 2);
        assert!(counter.take_finished().is_none());
    }

    #[test]
    fn test_day_rollover_moves_bucket_to_history() {
        let day = Arc::new(AtomicI32::new(0));
        let day_for_provider = day.clone();
        let mut counter = VisitCounter::with_date_provider(Box::new(move || {
            NaiveDate::from_ymd_opt(2024, 1, 15 + day_for_provider.load(Ordering::SeqCst) as u32).unwrap()
        }));

        counter.record("hello-world", "1.2.3.4");
        day.store(1, Ordering::SeqCst);
        counter.record("hello-world", "1.2.3.4");

        let finished = counter.take_finished().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(finished[0].total, 1);

        let current = counter.buckets.get("hello-world").unwrap();
        assert_eq!(current.date, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
    }

    #[test]
    fn test_roll_over_without_new_visits() {
        let day = Arc::new(AtomicI32::new(0));
        let day_for_provider = day.clone();
        let mut counter = VisitCounter::with_date_provider(Box::new(move || {
            NaiveDate::from_ymd_opt(2024, 1, 15 + day_for_provider.load(Ordering::SeqCst) as u32).unwrap()
        }));

        counter.record("a-post", "1.2.3.4");
        counter.roll_over();
        assert!(counter.take_finished().is_none());

        day.store(1, Ordering::SeqCst);
        counter.roll_over();
        let finished = counter.take_finished().unwrap();
        assert_eq!(finished[0].slug, "a-post");
        assert!(counter.buckets.is_empty());
    }
}
