use super::{
    DailyScore, DateRange, EventStore, FeatureAverages, HourlyCount, Statistics, StoreError,
    StoredEvent,
};
use crate::detect::DetectionFeatures;
use crate::lock::lock_or_recover;
use chrono::{DateTime, Local, NaiveDate, Timelike};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audio_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    duration REAL NOT NULL,
    dominant_frequency REAL NOT NULL,
    high_energy_ratio REAL NOT NULL,
    peak_amplitude REAL NOT NULL,
    is_zap INTEGER NOT NULL,
    audio_features TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS daily_scores (
    date TEXT PRIMARY KEY,
    score INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS kills (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    date TEXT NOT NULL,
    hour INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS kills_date ON kills(date);
";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed [`EventStore`]. One connection, serialized behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "event database opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Newest events first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = lock_or_recover(&self.conn, "event store");
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, duration, dominant_frequency, high_energy_ratio, peak_amplitude, is_zap
             FROM audio_events ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok(StoredEvent {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                duration: row.get(2)?,
                dominant_frequency: row.get(3)?,
                high_energy_ratio: row.get(4)?,
                peak_amplitude: row.get(5)?,
                is_zap: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Relabel an event after manual review. Returns false when the id is unknown.
    pub fn update_zap_status(&self, id: i64, is_zap: bool) -> Result<bool, StoreError> {
        let conn = lock_or_recover(&self.conn, "event store");
        let changed = conn.execute(
            "UPDATE audio_events SET is_zap = ?1 WHERE id = ?2",
            params![is_zap, id],
        )?;
        debug!(id, is_zap, changed, "event relabelled");
        Ok(changed > 0)
    }

    /// Average features for zaps and non-zaps, zaps first.
    pub fn feature_averages(&self) -> Result<Vec<FeatureAverages>, StoreError> {
        let conn = lock_or_recover(&self.conn, "event store");
        let mut stmt = conn.prepare(
            "SELECT is_zap, COUNT(*), AVG(duration), AVG(dominant_frequency), AVG(high_energy_ratio), AVG(peak_amplitude)
             FROM audio_events GROUP BY is_zap ORDER BY is_zap DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(FeatureAverages {
                is_zap: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
                duration: row.get(2)?,
                dominant_frequency: row.get(3)?,
                high_energy_ratio: row.get(4)?,
                peak_amplitude: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Kills per hour of day within `range`, hours without kills omitted.
    pub fn hourly_distribution(&self, range: DateRange) -> Result<Vec<HourlyCount>, StoreError> {
        let conn = lock_or_recover(&self.conn, "event store");
        hourly_distribution(&conn, range)
    }
}

impl EventStore for SqliteStore {
    fn record_event(
        &self,
        features: &DetectionFeatures,
        at: DateTime<Local>,
    ) -> Result<i64, StoreError> {
        let encoded = serde_json::to_string(features)?;
        let conn = lock_or_recover(&self.conn, "event store");
        conn.execute(
            "INSERT INTO audio_events
             (timestamp, duration, dominant_frequency, high_energy_ratio, peak_amplitude, is_zap, audio_features)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                at.to_rfc3339(),
                features.duration_secs,
                f64::from(features.dominant_frequency),
                features.high_energy_ratio,
                f64::from(features.peak_amplitude),
                features.is_zap,
                encoded,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn record_kill(&self, at: DateTime<Local>) -> Result<(), StoreError> {
        let date = at.format(DATE_FORMAT).to_string();
        let mut conn = lock_or_recover(&self.conn, "event store");
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO daily_scores (date, score) VALUES (?1, 1)
             ON CONFLICT(date) DO UPDATE SET score = score + 1",
            params![date],
        )?;
        tx.execute(
            "INSERT INTO kills (timestamp, date, hour) VALUES (?1, ?2, ?3)",
            params![at.to_rfc3339(), date, at.hour()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn daily_score(&self, date: NaiveDate) -> Result<u32, StoreError> {
        let conn = lock_or_recover(&self.conn, "event store");
        let score: Option<i64> = conn
            .query_row(
                "SELECT score FROM daily_scores WHERE date = ?1",
                params![date.format(DATE_FORMAT).to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32)
    }

    fn statistics(&self, range: DateRange) -> Result<Statistics, StoreError> {
        let conn = lock_or_recover(&self.conn, "event store");
        let (start, end) = bounds(range);
        let mut stmt = conn.prepare(
            "SELECT date, score FROM daily_scores
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
             ORDER BY date DESC",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut daily_scores = Vec::new();
        for row in rows {
            let (date, score) = row?;
            let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|_| StoreError::Corrupt(format!("bad score date '{date}'")))?;
            daily_scores.push(DailyScore {
                date,
                score: score.clamp(0, i64::from(u32::MAX)) as u32,
            });
        }
        drop(stmt);

        let total_kills: u64 = daily_scores.iter().map(|day| u64::from(day.score)).sum();
        let best_day = daily_scores
            .iter()
            .fold(None::<&DailyScore>, |best, day| match best {
                Some(current) if current.score >= day.score => Some(current),
                _ => Some(day),
            })
            .cloned();
        let average_daily_kills = if daily_scores.is_empty() {
            0.0
        } else {
            total_kills as f64 / daily_scores.len() as f64
        };
        let hourly = hourly_distribution(&conn, range)?;
        let busiest_hour = hourly
            .iter()
            .copied()
            .fold(None::<HourlyCount>, |best, hour| match best {
                Some(current) if current.kills >= hour.kills => Some(current),
                _ => Some(hour),
            });

        Ok(Statistics {
            daily_scores,
            total_kills,
            best_day,
            average_daily_kills,
            busiest_hour,
            hourly,
        })
    }
}

fn bounds(range: DateRange) -> (Option<String>, Option<String>) {
    (
        range.start.map(|date| date.format(DATE_FORMAT).to_string()),
        range.end.map(|date| date.format(DATE_FORMAT).to_string()),
    )
}

fn hourly_distribution(conn: &Connection, range: DateRange) -> Result<Vec<HourlyCount>, StoreError> {
    let (start, end) = bounds(range);
    let mut stmt = conn.prepare(
        "SELECT hour, COUNT(*) FROM kills
         WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
         GROUP BY hour ORDER BY hour",
    )?;
    let rows = stmt.query_map(params![start, end], |row| {
        Ok(HourlyCount {
            hour: row.get(0)?,
            kills: row.get::<_, i64>(1)?.max(0) as u64,
        })
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}
