use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error};
use tracker::Snapshot;

/// Fan-out point for dashboard viewers.
///
/// Each published snapshot is serialized exactly once and handed to a
/// broadcast channel; every viewer connection owns its receiver. A viewer
/// that falls more than the channel capacity behind loses the oldest
/// buffered payloads and resumes at the newest one, so slow consumers get
/// bounded staleness instead of an ever-growing backlog.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<Arc<str>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Serialize once and deliver to every connected viewer.
    pub fn publish(&self, snapshot: &Snapshot) {
        let payload = match serde_json::to_string(&snapshot.dashboard()) {
            Ok(json) => json,
            Err(err) => {
                error!(%err, "snapshot serialization failed");
                return;
            }
        };
        // Err means no viewer is connected, which is fine.
        let _ = self.tx.send(Arc::from(payload));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    pub fn viewers(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Consume dirty snapshots from the aggregation task, keep the latest one
/// for the REST handlers and the lights adapter, and broadcast the payload.
pub fn spawn_fanout(
    mut rx: mpsc::Receiver<Snapshot>,
    hub: Hub,
    latest: watch::Sender<Option<Snapshot>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            let _ = latest.send(Some(snapshot.clone()));
            hub.publish(&snapshot);
        }
        debug!("snapshot fan-out stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::broadcast::error::RecvError;
    use tracker::{AllTimeStats, DayStats, Emotion};

    fn snapshot(emotion: Emotion) -> Snapshot {
        let now = Utc::now();
        let mut today = DayStats::empty(now.date_naive());
        today.emotions.bump(emotion);
        Snapshot {
            taken_at: now,
            current_emotion: Some(emotion),
            active_touches: 0,
            today,
            all_time: AllTimeStats::default(),
        }
    }

    #[tokio::test]
    async fn delivers_payload_to_subscriber() {
        let hub = Hub::new(8);
        let mut rx = hub.subscribe();
        hub.publish(&snapshot(Emotion::Happy));
        let payload = rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["emotion"]["current"], "happy");
    }

    #[tokio::test]
    async fn stalled_viewer_resumes_at_newest() {
        let hub = Hub::new(2);
        let mut rx = hub.subscribe();
        for _ in 0..10 {
            hub.publish(&snapshot(Emotion::Sad));
        }
        hub.publish(&snapshot(Emotion::Surprise));
        // The backlog overflowed; the viewer is told how much it missed...
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
        // ...then drains the retained tail, whose last entry is the newest.
        let mut last = rx.recv().await.unwrap();
        while let Ok(payload) = rx.try_recv() {
            last = payload;
        }
        let json: serde_json::Value = serde_json::from_str(&last).unwrap();
        assert_eq!(json["emotion"]["current"], "surprise");
    }

    #[tokio::test]
    async fn publish_without_viewers_is_harmless() {
        let hub = Hub::new(2);
        assert_eq!(hub.viewers(), 0);
        hub.publish(&snapshot(Emotion::Angry));
    }

    #[tokio::test]
    async fn fanout_updates_latest_and_broadcasts() {
        let hub = Hub::new(8);
        let mut sub = hub.subscribe();
        let (tx, rx) = mpsc::channel(4);
        let (latest_tx, latest_rx) = watch::channel(None);
        let task = spawn_fanout(rx, hub, latest_tx);

        tx.send(snapshot(Emotion::Fear)).await.unwrap();
        let payload = sub.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["emotion"]["current"], "fear");
        assert_eq!(
            latest_rx.borrow().as_ref().unwrap().current_emotion,
            Some(Emotion::Fear)
        );

        drop(tx);
        task.await.unwrap();
    }
}
