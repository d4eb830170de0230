use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::emotion::Emotion;
use crate::event::{InputEvent, TouchEdge};
use crate::inbox::{self, Inbox, InboxSender};
use crate::state::Snapshot;
use crate::stats::{AllTimeStats, DayStats};

#[derive(Clone, Debug)]
pub struct AggregatorConfig {
    /// How long after the last classification `current_emotion` stays valid
    /// before reverting to the no-face sentinel.
    pub freshness_window: Duration,
    /// Heartbeat driving freshness expiry and day rollover.
    pub tick_interval: Duration,
    /// Capacity of the event inbox.
    pub queue_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(5),
            tick_interval: Duration::from_millis(250),
            queue_capacity: 256,
        }
    }
}

/// Single writer of all live counters. Every mutation happens on the one
/// task running [`run`], so none of the fields need locking.
pub struct Aggregator {
    current_emotion: Option<Emotion>,
    last_emotion_at: Option<DateTime<Utc>>,
    pending_touches: HashMap<u32, DateTime<Utc>>,
    today: DayStats,
    all_time: AllTimeStats,
    freshness_window: chrono::Duration,
    dirty: bool,
    rejected_events: u64,
    unmatched_ends: u64,
}

impl Aggregator {
    /// Build from the state the store recovered at startup.
    pub fn new(today: DayStats, all_time: AllTimeStats, config: &AggregatorConfig) -> Self {
        Self {
            current_emotion: None,
            last_emotion_at: None,
            pending_touches: HashMap::new(),
            today,
            all_time,
            freshness_window: chrono::Duration::from_std(config.freshness_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(5)),
            dirty: false,
            rejected_events: 0,
            unmatched_ends: 0,
        }
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::Emotion { label, at } => self.submit_emotion(&label, at),
            InputEvent::Touch {
                edge,
                electrode,
                at,
            } => self.submit_touch(edge, electrode, at),
            InputEvent::Shutdown => {}
        }
    }

    /// Record one classification. Only the first event of each maximal run
    /// of identical labels counts; repeats merely refresh the timestamp.
    pub fn submit_emotion(&mut self, label: &str, at: DateTime<Utc>) {
        let emotion: Emotion = match label.parse() {
            Ok(e) => e,
            Err(err) => {
                self.rejected_events += 1;
                warn!(%err, "rejected emotion event");
                return;
            }
        };
        self.last_emotion_at = Some(at);
        if self.current_emotion != Some(emotion) {
            self.current_emotion = Some(emotion);
            self.today.emotions.bump(emotion);
            self.all_time.emotions.bump(emotion);
            self.dirty = true;
        }
    }

    /// Record one touch edge. A completed begin/end pair counts as a single
    /// session; an end with no open session is a driver glitch and is
    /// dropped.
    pub fn submit_touch(&mut self, edge: TouchEdge, electrode: u32, at: DateTime<Utc>) {
        match edge {
            TouchEdge::Begin => {
                if self.pending_touches.insert(electrode, at).is_some() {
                    warn!(electrode, "touch begin while session open, restarting");
                }
                self.dirty = true;
            }
            TouchEdge::End => {
                let Some(start) = self.pending_touches.remove(&electrode) else {
                    self.unmatched_ends += 1;
                    warn!(electrode, "touch end without begin, dropping");
                    return;
                };
                let duration = ((at - start).num_milliseconds() as f64 / 1000.0).max(0.0);
                self.today.touch_count += 1;
                self.today.touch_duration_total += duration;
                self.all_time.total_touches += 1;
                self.all_time.total_touch_duration += duration;
                self.dirty = true;
            }
        }
    }

    /// Heartbeat: expire a stale classification and roll the day over.
    /// Returns the closed day's stats when the date changed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<DayStats> {
        if self.current_emotion.is_some() {
            let stale = self
                .last_emotion_at
                .map_or(true, |at| now - at > self.freshness_window);
            if stale {
                self.current_emotion = None;
                self.dirty = true;
            }
        }
        if now.date_naive() != self.today.date {
            let archived =
                std::mem::replace(&mut self.today, DayStats::empty(now.date_naive()));
            self.dirty = true;
            return Some(archived);
        }
        None
    }

    /// O(1) copy of the live state; never touches I/O.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            taken_at: now,
            current_emotion: self.current_emotion,
            active_touches: self.pending_touches.len() as u64,
            today: self.today.clone(),
            all_time: self.all_time.clone(),
        }
    }

    /// Clear and return the dirty flag. Downstream writes happen only when
    /// this returns true, bounding write amplification under bursty input.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn rejected_events(&self) -> u64 {
        self.rejected_events
    }

    pub fn unmatched_ends(&self) -> u64 {
        self.unmatched_ends
    }
}

/// Channels fed by the aggregation task.
pub struct Outputs {
    /// Dirty snapshots, consumed by the broadcast fan-out task.
    pub snapshots: mpsc::Sender<Snapshot>,
    /// Day rows for the persistence worker; last write per date wins.
    pub store: mpsc::Sender<DayStats>,
}

/// Cloneable push interface handed to the event sources.
#[derive(Clone)]
pub struct AggregatorHandle {
    tx: InboxSender<InputEvent>,
}

impl AggregatorHandle {
    pub fn on_emotion(&self, label: impl Into<String>, at: DateTime<Utc>) {
        self.tx.push(InputEvent::emotion(label, at));
    }

    pub fn on_touch(&self, edge: TouchEdge, at: DateTime<Utc>) {
        self.on_touch_electrode(edge, 0, at);
    }

    pub fn on_touch_electrode(&self, edge: TouchEdge, electrode: u32, at: DateTime<Utc>) {
        self.tx.push(InputEvent::touch(edge, electrode, at));
    }

    /// Stop accepting events; queued ones are still drained before the
    /// aggregation task flushes and exits.
    pub fn shutdown(&self) {
        self.tx.push(InputEvent::Shutdown);
        self.tx.close();
    }

    /// Events shed because the inbox was full.
    pub fn overflow(&self) -> u64 {
        self.tx.dropped()
    }
}

/// Spawn the aggregation task. The returned handle is the only way to reach
/// the state; the join handle resolves after a clean flush on shutdown.
pub fn run(
    aggregator: Aggregator,
    config: &AggregatorConfig,
    outputs: Outputs,
) -> (AggregatorHandle, tokio::task::JoinHandle<()>) {
    let (tx, inbox) = inbox::channel(config.queue_capacity);
    let tick_interval = config.tick_interval;
    let join = tokio::spawn(drive(aggregator, inbox, outputs, tick_interval));
    (AggregatorHandle { tx }, join)
}

async fn drive(
    mut agg: Aggregator,
    mut inbox: Inbox<InputEvent>,
    outputs: Outputs,
    tick_interval: Duration,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut deferred_row: Option<DayStats> = None;
    'main: loop {
        tokio::select! {
            event = inbox.recv() => {
                let Some(event) = event else { break 'main };
                if matches!(event, InputEvent::Shutdown) {
                    break 'main;
                }
                agg.apply(event);
                // Drain the burst before materializing a snapshot.
                while let Some(event) = inbox.try_recv() {
                    if matches!(event, InputEvent::Shutdown) {
                        publish(&mut agg, &outputs, &mut deferred_row);
                        break 'main;
                    }
                    agg.apply(event);
                }
            }
            _ = ticker.tick() => {
                if let Some(closed) = agg.tick(Utc::now()) {
                    // A closed day must reach the store even under load.
                    if outputs.store.send(closed).await.is_err() {
                        warn!("store worker gone, day archive lost");
                    }
                }
            }
        }
        publish(&mut agg, &outputs, &mut deferred_row);
    }
    // Clean shutdown: today's row goes out synchronously so nothing is lost.
    if let Some(row) = deferred_row.take() {
        if outputs.store.send(row).await.is_err() {
            warn!("store worker gone during shutdown flush");
        }
    }
    let today = agg.snapshot(Utc::now()).today;
    if outputs.store.send(today).await.is_err() {
        warn!("store worker gone during shutdown flush");
    }
    debug!(
        rejected = agg.rejected_events(),
        unmatched = agg.unmatched_ends(),
        "aggregation task stopped"
    );
}

fn publish(agg: &mut Aggregator, outputs: &Outputs, deferred_row: &mut Option<DayStats>) {
    // A row parked by an earlier full store queue goes out first so writes
    // for one date stay ordered.
    if let Some(row) = deferred_row.take() {
        if let Err(mpsc::error::TrySendError::Full(row)) = outputs.store.try_send(row) {
            *deferred_row = Some(row);
        }
    }
    if !agg.take_dirty() {
        return;
    }
    let snapshot = agg.snapshot(Utc::now());
    if let Err(mpsc::error::TrySendError::Full(row)) =
        outputs.store.try_send(snapshot.today.clone())
    {
        debug!("store queue full, day row parked for the next tick");
        *deferred_row = Some(row);
    }
    match outputs.snapshots.try_send(snapshot) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            // Keep the state dirty so the heartbeat republishes; otherwise
            // the last update before a quiet period would never reach
            // viewers.
            agg.dirty = true;
            debug!("snapshot queue full, republishing on next tick");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("snapshot consumer gone");
        }
    }
}
