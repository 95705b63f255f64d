//! Metric aggregation
//!
//! Folds a record stream into one [`ActivitySummary`]. Each tag-0 value is
//! classified by its last decimal digit and contributes to a single metric:
//!
//! | `v % 10` | metric    | contribution          |
//! |----------|-----------|-----------------------|
//! | 0        | distance  | `(v % 10000) / 1000` km |
//! | 1        | calories  | `v % 1000`            |
//! | 2        | duration  | `v % 3600` s          |
//! | 3        | heart rate| `(v % 200) + 60` bpm  |
//!
//! All other values are ignored. These rules stand in for real message-type
//! decoding and must stay exactly as written.

use chrono::{Local, NaiveDateTime};

use crate::types::{
    ActivitySummary, RawRecord, DEFAULT_ACTIVITY_NAME, DEFAULT_ACTIVITY_TYPE, START_TIME_FORMAT,
};

/// Lowest heart rate a sample can produce
pub const MIN_HEART_RATE: u32 = 60;

/// Metric selected by a tag-0 value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Distance,
    Calories,
    Duration,
    HeartRate,
    Unmapped,
}

impl FieldType {
    pub fn classify(value: u32) -> Self {
        match value % 10 {
            0 => FieldType::Distance,
            1 => FieldType::Calories,
            2 => FieldType::Duration,
            3 => FieldType::HeartRate,
            _ => FieldType::Unmapped,
        }
    }
}

/// Running totals for one activity
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    distance_km: f64,
    calories: u64,
    duration_secs: u64,
    max_hr: u32,
    hr_sum: u64,
    hr_count: u64,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate a whole record sequence, stamping the current local time
    pub fn aggregate<I>(records: I) -> ActivitySummary
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut aggregator = Self::new();
        for record in records {
            aggregator.push(&record);
        }
        aggregator.finish()
    }

    /// Fold one record into the running totals
    pub fn push(&mut self, record: &RawRecord) {
        if let Some(v) = record.field(0) {
            self.push_value(v);
        }
    }

    fn push_value(&mut self, v: u32) {
        match FieldType::classify(v) {
            FieldType::Distance => self.distance_km += f64::from(v % 10_000) / 1000.0,
            FieldType::Calories => self.calories += u64::from(v % 1000),
            FieldType::Duration => self.duration_secs += u64::from(v % 3600),
            FieldType::HeartRate => {
                let hr = v % 200 + MIN_HEART_RATE;
                self.max_hr = self.max_hr.max(hr);
                self.hr_sum += u64::from(hr);
                self.hr_count += 1;
            }
            FieldType::Unmapped => {}
        }
    }

    /// Integer mean of the heart-rate samples, 0 when there are none
    pub fn average_hr(&self) -> u32 {
        if self.hr_count == 0 {
            return 0;
        }
        // Every sample is below 260, so the mean fits.
        (self.hr_sum / self.hr_count) as u32
    }

    pub fn finish(self) -> ActivitySummary {
        let now = Local::now().naive_local();
        self.finish_at(now)
    }

    /// Produce the summary with an explicit start time
    pub fn finish_at(self, start_time: NaiveDateTime) -> ActivitySummary {
        ActivitySummary {
            name: DEFAULT_ACTIVITY_NAME.to_string(),
            activity_type: DEFAULT_ACTIVITY_TYPE.to_string(),
            start_time: start_time.format(START_TIME_FORMAT).to_string(),
            duration: self.duration_secs,
            distance: self.distance_km,
            calories: self.calories,
            avg_hr: self.average_hr(),
            max_hr: self.max_hr,
            elevation_gain: 0,
        }
    }
}
