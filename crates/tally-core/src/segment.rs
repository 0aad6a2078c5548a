//! Time segmentation of checkpoint sightings.
//!
//! Passed runners are grouped into fixed-width buckets measured from the race
//! start, so bucket boundaries follow the event clock rather than the epoch.
//! Segments are recomputed from the current sightings every time; nothing
//! here is stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{
    RunnerStatus, SightingKey, SightingRecord, TimeSegment, DEFAULT_BUCKET_WIDTH_MINUTES,
};

/// Groups sightings into time segments anchored at a race's start time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSegmenter {
    origin: DateTime<Utc>,
    bucket_width: Duration,
}

impl TimeSegmenter {
    /// Segmenter with the default five minute width
    #[must_use]
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            bucket_width: Duration::minutes(i64::from(DEFAULT_BUCKET_WIDTH_MINUTES)),
        }
    }

    /// Override the bucket width. Widths below one minute are raised to one
    /// minute so that segment labels stay unique.
    #[must_use]
    pub fn with_bucket_width(mut self, bucket_width: Duration) -> Self {
        self.bucket_width = bucket_width.max(Duration::minutes(1));
        self
    }

    #[must_use]
    pub const fn bucket_width(&self) -> Duration {
        self.bucket_width
    }

    /// Start of the bucket containing `at`
    #[must_use]
    pub fn bucket_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let width_ms = self.bucket_width.num_milliseconds();
        let offset_ms = (at - self.origin).num_milliseconds();
        let index = offset_ms.div_euclid(width_ms);
        self.origin + Duration::milliseconds(index * width_ms)
    }

    /// Label of the bucket containing `at`
    #[must_use]
    pub fn label_for(&self, at: DateTime<Utc>) -> String {
        format_segment_label(self.bucket_start(at))
    }

    /// Group `records` into segments sorted by time, members sorted by runner.
    ///
    /// Only passed runners with a mark-off time take part. The same input
    /// always produces the same output, including member order.
    #[must_use]
    pub fn segment(&self, records: &[SightingRecord]) -> Vec<TimeSegment> {
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<SightingRecord>> = BTreeMap::new();

        for record in records {
            if let Some(at) = segmentable_time(record) {
                buckets
                    .entry(self.bucket_start(at))
                    .or_default()
                    .push(record.clone());
            }
        }

        buckets
            .into_iter()
            .map(|(common_time, mut members)| {
                members.sort_by_key(|member| (member.runner_number, member.checkpoint_number));
                let called_in = members.iter().all(|member| member.called_in);
                TimeSegment {
                    common_time_label: format_segment_label(common_time),
                    common_time,
                    members,
                    called_in,
                }
            })
            .collect()
    }

    /// Keys of the records currently belonging to the segment labelled `label`.
    ///
    /// Computed fresh from `records`; this is exactly the write set of
    /// "call this segment in".
    #[must_use]
    pub fn members_with_label(&self, records: &[SightingRecord], label: &str) -> Vec<SightingKey> {
        let mut keys = records
            .iter()
            .filter(|record| {
                segmentable_time(record).is_some_and(|at| self.label_for(at) == label)
            })
            .map(SightingRecord::key)
            .collect::<Vec<_>>();
        keys.sort();
        keys
    }
}

/// Render a bucket start as its operator-facing label
#[must_use]
pub fn format_segment_label(common_time: DateTime<Utc>) -> String {
    common_time.format("%Y-%m-%d %H:%M").to_string()
}

fn segmentable_time(record: &SightingRecord) -> Option<DateTime<Utc>> {
    if record.status == RunnerStatus::Passed {
        record.mark_off_time
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RaceId;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 6, 8, 0, 0).unwrap()
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 6, hour, minute, second).unwrap()
    }

    fn passed(runner: u32, time: DateTime<Utc>, called_in: bool) -> SightingRecord {
        let mut record = SightingRecord::new(RaceId::new("r1").unwrap(), 2, runner)
            .with_status(RunnerStatus::Passed, Some(time));
        record.called_in = called_in;
        record
    }

    #[test]
    fn groups_by_bucket_and_sorts_members_by_runner() {
        let records = vec![
            passed(105, at(10, 6, 0), true),
            passed(101, at(10, 5, 0), true),
            passed(103, at(10, 9, 59), true),
            passed(102, at(10, 10, 0), true),
        ];

        let segments = TimeSegmenter::new(start()).segment(&records);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].common_time_label, "2026-06-06 10:05");
        assert_eq!(segments[0].runner_numbers(), vec![101, 103, 105]);
        assert_eq!(segments[1].common_time, at(10, 10, 0));
        assert_eq!(segments[1].runner_numbers(), vec![102]);
    }

    #[test]
    fn buckets_align_to_race_start_not_epoch() {
        let segmenter = TimeSegmenter::new(at(8, 2, 0));
        assert_eq!(segmenter.bucket_start(at(8, 6, 59)), at(8, 2, 0));
        assert_eq!(segmenter.bucket_start(at(8, 7, 0)), at(8, 7, 0));
        // Before the start still floors downwards
        assert_eq!(segmenter.bucket_start(at(8, 1, 0)), at(7, 57, 0));
    }

    #[test]
    fn skips_non_passed_and_unmarked_records() {
        let race = RaceId::new("r1").unwrap();
        let records = vec![
            SightingRecord::new(race.clone(), 2, 1),
            SightingRecord::new(race.clone(), 2, 2).with_status(RunnerStatus::Withdrawn, Some(at(9, 0, 0))),
            SightingRecord::new(race, 2, 3).with_status(RunnerStatus::Passed, None),
        ];
        assert!(TimeSegmenter::new(start()).segment(&records).is_empty());
    }

    #[test]
    fn called_in_requires_every_member() {
        let records = vec![
            passed(1, at(9, 0, 0), true),
            passed(2, at(9, 1, 0), false),
            passed(3, at(9, 5, 0), true),
        ];
        let segments = TimeSegmenter::new(start()).segment(&records);
        assert!(!segments[0].called_in);
        assert_eq!(segments[0].pending_count(), 1);
        assert!(segments[1].called_in);
    }

    #[test]
    fn segmentation_is_deterministic_regardless_of_input_order() {
        let mut records = vec![
            passed(7, at(9, 3, 0), false),
            passed(2, at(9, 1, 0), true),
            passed(9, at(9, 12, 0), false),
        ];
        let segmenter = TimeSegmenter::new(start());
        let first = segmenter.segment(&records);
        assert_eq!(first, segmenter.segment(&records));

        records.reverse();
        assert_eq!(first, segmenter.segment(&records));
    }

    #[test]
    fn custom_width_and_minimum_width() {
        let wide = TimeSegmenter::new(start()).with_bucket_width(Duration::minutes(15));
        assert_eq!(wide.label_for(at(8, 29, 0)), "2026-06-06 08:15");

        let tiny = TimeSegmenter::new(start()).with_bucket_width(Duration::seconds(5));
        assert_eq!(tiny.bucket_width(), Duration::minutes(1));
    }

    #[test]
    fn members_with_label_selects_current_members_only() {
        let race = RaceId::new("r1").unwrap();
        let records = vec![
            passed(11, at(9, 0, 0), false),
            passed(10, at(9, 4, 0), false),
            passed(12, at(9, 5, 0), false),
            SightingRecord::new(race, 2, 13).with_status(RunnerStatus::Dnf, Some(at(9, 1, 0))),
        ];
        let keys = TimeSegmenter::new(start()).members_with_label(&records, "2026-06-06 09:00");
        let runners = keys.iter().map(|key| key.runner_number).collect::<Vec<_>>();
        assert_eq!(runners, vec![10, 11]);

        assert!(TimeSegmenter::new(start())
            .members_with_label(&records, "2026-06-06 07:00")
            .is_empty());
    }
}
