//! Durable per-day statistics, one SQLite row per calendar date.
//!
//! The all-time totals are never written; they are rebuilt as the sum over
//! day rows at startup, so the ledger stays the single source of truth even
//! after a crash. Writes go through the [`worker`] so a slow disk never
//! stalls event ingestion.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracker::{AllTimeStats, DayStats, EmotionCounts};

pub mod worker;

pub use worker::{spawn_worker, WorkerConfig};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("corrupt day row for {date}: {source}")]
    Corrupt {
        date: String,
        source: serde_json::Error,
    },
    #[error("invalid date key: {0}")]
    BadDate(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// State recovered at startup.
#[derive(Debug, PartialEq)]
pub struct Recovered {
    pub today: DayStats,
    pub all_time: AllTimeStats,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS daily_stats (
                date TEXT PRIMARY KEY,
                emotion_counts TEXT NOT NULL,
                touch_count INTEGER NOT NULL,
                total_touch_duration REAL NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Read every persisted day and rebuild the running totals. A missing
    /// file or empty table yields zeroed state; an unreadable row is fatal
    /// so history is never silently discarded.
    pub fn load_or_init(&self, today: NaiveDate) -> Result<Recovered> {
        let mut stmt = self.conn.prepare(
            "SELECT date, emotion_counts, touch_count, total_touch_duration FROM daily_stats",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut all_time = AllTimeStats::default();
        let mut current = DayStats::empty(today);
        for row in rows {
            let (date_str, counts_json, touch_count, total_duration) = row?;
            let date = date_str
                .parse::<NaiveDate>()
                .map_err(|_| StoreError::BadDate(date_str.clone()))?;
            let emotions: EmotionCounts =
                serde_json::from_str(&counts_json).map_err(|source| StoreError::Corrupt {
                    date: date_str,
                    source,
                })?;
            let day = DayStats {
                date,
                emotions,
                touch_count: touch_count.max(0) as u64,
                touch_duration_total: total_duration,
            };
            all_time.absorb(&day);
            if date == today {
                current = day;
            }
        }
        Ok(Recovered {
            today: current,
            all_time,
        })
    }

    /// Write or replace the row for one date. A single statement, so a
    /// crash leaves either the old or the new row, never a torn one.
    pub fn upsert(&self, day: &DayStats) -> Result<()> {
        let counts = serde_json::to_string(&day.emotions).map_err(|source| StoreError::Corrupt {
            date: day.date.to_string(),
            source,
        })?;
        self.conn.execute(
            "INSERT OR REPLACE INTO daily_stats \
             (date, emotion_counts, touch_count, total_touch_duration) \
             VALUES (?1, ?2, ?3, ?4)",
            (
                day.date.to_string(),
                counts,
                day.touch_count as i64,
                day.touch_duration_total,
            ),
        )?;
        Ok(())
    }

    /// Fetch one day's row, if present.
    pub fn day(&self, date: NaiveDate) -> Result<Option<DayStats>> {
        let row = self
            .conn
            .query_row(
                "SELECT emotion_counts, touch_count, total_touch_duration \
                 FROM daily_stats WHERE date = ?1",
                [date.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((counts_json, touch_count, total_duration)) = row else {
            return Ok(None);
        };
        let emotions =
            serde_json::from_str(&counts_json).map_err(|source| StoreError::Corrupt {
                date: date.to_string(),
                source,
            })?;
        Ok(Some(DayStats {
            date,
            emotions,
            touch_count: touch_count.max(0) as u64,
            touch_duration_total: total_duration,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker::Emotion;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn sample(d: u32) -> DayStats {
        let mut day = DayStats::empty(date(d));
        day.emotions.bump(Emotion::Happy);
        day.emotions.bump(Emotion::Fear);
        day.touch_count = 3;
        day.touch_duration_total = 4.25;
        day
    }

    #[test]
    fn first_run_yields_zeroed_state() {
        let store = Store::open_in_memory().unwrap();
        let recovered = store.load_or_init(date(1)).unwrap();
        assert_eq!(recovered.today, DayStats::empty(date(1)));
        assert_eq!(recovered.all_time, AllTimeStats::default());
    }

    #[test]
    fn upsert_round_trips_exactly() {
        let store = Store::open_in_memory().unwrap();
        let day = sample(2);
        store.upsert(&day).unwrap();
        assert_eq!(store.day(date(2)).unwrap().unwrap(), day);

        let recovered = store.load_or_init(date(2)).unwrap();
        assert_eq!(recovered.today, day);
        assert_eq!(recovered.all_time.total_touches, 3);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let store = Store::open_in_memory().unwrap();
        let mut day = sample(2);
        store.upsert(&day).unwrap();
        day.touch_count = 9;
        store.upsert(&day).unwrap();
        assert_eq!(store.day(date(2)).unwrap().unwrap().touch_count, 9);
    }

    #[test]
    fn all_zero_day_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let day = DayStats::empty(date(5));
        store.upsert(&day).unwrap();
        assert_eq!(store.day(date(5)).unwrap().unwrap(), day);
    }

    #[test]
    fn all_time_sums_every_day() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&sample(1)).unwrap();
        store.upsert(&sample(2)).unwrap();
        let recovered = store.load_or_init(date(2)).unwrap();
        assert_eq!(recovered.all_time.emotions.happy, 2);
        assert_eq!(recovered.all_time.total_touches, 6);
        assert!((recovered.all_time.total_touch_duration - 8.5).abs() < 1e-9);
        // Today's row is part of the total, not double-counted later.
        assert_eq!(recovered.today.touch_count, 3);
    }

    #[test]
    fn corrupt_counts_column_is_fatal() {
        let store = Store::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO daily_stats VALUES ('2025-04-01', 'not json', 0, 0.0)",
                [],
            )
            .unwrap();
        let err = store.load_or_init(date(1)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn survives_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotion.db");
        {
            let store = Store::open(&path).unwrap();
            store.upsert(&sample(3)).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.day(date(3)).unwrap().unwrap(), sample(3));
    }
}
