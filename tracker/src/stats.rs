use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::emotion::Emotion;

/// Per-emotion counters. A struct rather than a map so every serialized
/// state carries all seven keys, zeroed or not.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionCounts {
    pub happy: u64,
    pub sad: u64,
    pub angry: u64,
    pub neutral: u64,
    pub fear: u64,
    pub surprise: u64,
    pub disgust: u64,
}

impl EmotionCounts {
    pub fn get(&self, emotion: Emotion) -> u64 {
        match emotion {
            Emotion::Happy => self.happy,
            Emotion::Sad => self.sad,
            Emotion::Angry => self.angry,
            Emotion::Neutral => self.neutral,
            Emotion::Fear => self.fear,
            Emotion::Surprise => self.surprise,
            Emotion::Disgust => self.disgust,
        }
    }

    pub fn bump(&mut self, emotion: Emotion) {
        let slot = match emotion {
            Emotion::Happy => &mut self.happy,
            Emotion::Sad => &mut self.sad,
            Emotion::Angry => &mut self.angry,
            Emotion::Neutral => &mut self.neutral,
            Emotion::Fear => &mut self.fear,
            Emotion::Surprise => &mut self.surprise,
            Emotion::Disgust => &mut self.disgust,
        };
        *slot += 1;
    }

    pub fn merge(&mut self, other: &EmotionCounts) {
        for e in Emotion::ALL {
            let slot = match e {
                Emotion::Happy => &mut self.happy,
                Emotion::Sad => &mut self.sad,
                Emotion::Angry => &mut self.angry,
                Emotion::Neutral => &mut self.neutral,
                Emotion::Fear => &mut self.fear,
                Emotion::Surprise => &mut self.surprise,
                Emotion::Disgust => &mut self.disgust,
            };
            *slot += other.get(e);
        }
    }

    pub fn total(&self) -> u64 {
        Emotion::ALL.iter().map(|e| self.get(*e)).sum()
    }

    /// Emotion with the highest count. Ties resolve in [`Emotion::ALL`]
    /// order, so the result is deterministic.
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        for e in Emotion::ALL {
            if self.get(e) > self.get(best) {
                best = e;
            }
        }
        best
    }
}

/// Counters for one calendar day. Mutated in place while the day is
/// current, archived untouched afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub emotions: EmotionCounts,
    pub touch_count: u64,
    pub touch_duration_total: f64,
}

impl DayStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            emotions: EmotionCounts::default(),
            touch_count: 0,
            touch_duration_total: 0.0,
        }
    }
}

/// Running sum over every recorded day, today included. Never persisted
/// directly; rebuilt from day rows at startup and incremented live.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AllTimeStats {
    pub emotions: EmotionCounts,
    pub total_touches: u64,
    pub total_touch_duration: f64,
}

impl AllTimeStats {
    pub fn absorb(&mut self, day: &DayStats) {
        self.emotions.merge(&day.emotions);
        self.total_touches += day.touch_count;
        self.total_touch_duration += day.touch_duration_total;
    }

    pub fn total_emotions(&self) -> u64 {
        self.emotions.total()
    }

    pub fn dominant_emotion(&self) -> Emotion {
        self.emotions.dominant()
    }

    /// Mean touch duration in seconds; zero when nothing was recorded.
    pub fn avg_touch_duration(&self) -> f64 {
        if self.total_touches == 0 {
            0.0
        } else {
            self.total_touch_duration / self.total_touches as f64
        }
    }
}
