use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::emotion::{self, Emotion};
use crate::stats::{AllTimeStats, DayStats, EmotionCounts};

/// Immutable point-in-time copy of the live state, taken by the aggregation
/// task and handed to the hub, the lights adapter, and the REST handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub current_emotion: Option<Emotion>,
    pub active_touches: u64,
    pub today: DayStats,
    pub all_time: AllTimeStats,
}

impl Snapshot {
    /// Build the JSON payload pushed to dashboard viewers.
    pub fn dashboard(&self) -> DashboardState {
        DashboardState {
            time: self.taken_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            emotion: EmotionBlock {
                current: emotion::label(self.current_emotion).to_string(),
                counts: self.today.emotions,
            },
            touch: TouchBlock {
                today_touches: self.today.touch_count,
                active_touches: self.active_touches,
            },
            total_stats: TotalsBlock {
                total_emotions: self.all_time.total_emotions(),
                dominant_emotion: self.all_time.dominant_emotion().to_string(),
                total_touches: self.all_time.total_touches,
                avg_touch_duration: self.all_time.avg_touch_duration(),
                total_touch_duration: self.all_time.total_touch_duration,
            },
        }
    }
}

/// Wire shape of one dashboard update. Every field is always populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    pub time: String,
    pub emotion: EmotionBlock,
    pub touch: TouchBlock,
    pub total_stats: TotalsBlock,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionBlock {
    pub current: String,
    pub counts: EmotionCounts,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TouchBlock {
    pub today_touches: u64,
    pub active_touches: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TotalsBlock {
    pub total_emotions: u64,
    pub dominant_emotion: String,
    pub total_touches: u64,
    pub avg_touch_duration: f64,
    pub total_touch_duration: f64,
}
