use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tracing::{error, warn};
use tracker::DayStats;

use crate::Store;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Run the persistence worker on a blocking thread.
///
/// Rows are applied in order with last-write-wins coalescing per date. A row
/// that still fails after the retry budget is parked and retried on the next
/// write or when the channel closes at shutdown.
pub fn spawn_worker(
    store: Store,
    mut rx: mpsc::Receiver<DayStats>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut pending: BTreeMap<NaiveDate, DayStats> = BTreeMap::new();
        while let Some(day) = rx.blocking_recv() {
            pending.insert(day.date, day);
            while let Ok(day) = rx.try_recv() {
                pending.insert(day.date, day);
            }
            flush(&store, &mut pending, &config);
        }
        flush(&store, &mut pending, &config);
        if !pending.is_empty() {
            error!(
                rows = pending.len(),
                "persistence worker exiting with unflushed day rows"
            );
        }
    })
}

fn flush(store: &Store, pending: &mut BTreeMap<NaiveDate, DayStats>, config: &WorkerConfig) {
    pending.retain(|_, day| !write_with_retry(store, day, config));
}

fn write_with_retry(store: &Store, day: &DayStats, config: &WorkerConfig) -> bool {
    let mut backoff = config.initial_backoff;
    for attempt in 0..=config.max_retries {
        match store.upsert(day) {
            Ok(()) => return true,
            Err(err) => {
                warn!(%err, date = %day.date, attempt, "day row write failed");
                if attempt < config.max_retries {
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(config.max_backoff);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker::Emotion;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    #[tokio::test]
    async fn drains_and_persists_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotion.db");

        let (tx, rx) = mpsc::channel(16);
        let worker = spawn_worker(Store::open(&path).unwrap(), rx, WorkerConfig::default());

        let mut day = DayStats::empty(date(1));
        day.emotions.bump(Emotion::Sad);
        tx.send(day).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        let store = Store::open(&path).unwrap();
        let row = store.day(date(1)).unwrap().unwrap();
        assert_eq!(row.emotions.sad, 1);
    }

    #[tokio::test]
    async fn last_write_per_date_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emotion.db");

        let (tx, rx) = mpsc::channel(16);
        let mut first = DayStats::empty(date(2));
        first.touch_count = 1;
        let mut second = DayStats::empty(date(2));
        second.touch_count = 5;
        tx.send(first).await.unwrap();
        tx.send(second).await.unwrap();
        drop(tx);

        spawn_worker(Store::open(&path).unwrap(), rx, WorkerConfig::default())
            .await
            .unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.day(date(2)).unwrap().unwrap().touch_count, 5);
    }
}
