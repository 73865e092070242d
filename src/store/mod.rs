//! Persistence of classified events, kills and daily scores.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::detect::DetectionFeatures;
use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode audio features: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

/// Sink for detections and kills. Callers treat failures as non-fatal.
pub trait EventStore: Send + Sync {
    /// Record a classified frame; returns its event id.
    fn record_event(
        &self,
        features: &DetectionFeatures,
        at: DateTime<Local>,
    ) -> Result<i64, StoreError>;
    fn record_kill(&self, at: DateTime<Local>) -> Result<(), StoreError>;
    fn daily_score(&self, date: NaiveDate) -> Result<u32, StoreError>;
    fn statistics(&self, range: DateRange) -> Result<Statistics, StoreError>;
}

/// Inclusive calendar range; an open bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    /// The `days` calendar days ending with `today`.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: today.checked_sub_signed(Duration::days(span)),
            end: Some(today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyScore {
    pub date: NaiveDate,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourlyCount {
    pub hour: u32,
    pub kills: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Newest first.
    pub daily_scores: Vec<DailyScore>,
    pub total_kills: u64,
    pub best_day: Option<DailyScore>,
    pub average_daily_kills: f64,
    pub busiest_hour: Option<HourlyCount>,
    /// Only hours with kills, ascending.
    pub hourly: Vec<HourlyCount>,
}

/// A stored classification row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    pub timestamp: String,
    pub duration: f64,
    pub dominant_frequency: f64,
    pub high_energy_ratio: f64,
    pub peak_amplitude: f64,
    pub is_zap: bool,
}

/// Mean features of events grouped by their zap flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureAverages {
    pub is_zap: bool,
    pub count: u64,
    pub duration: f64,
    pub dominant_frequency: f64,
    pub high_energy_ratio: f64,
    pub peak_amplitude: f64,
}
