use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Edge of a touch interaction as reported by the sensor driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchEdge {
    Begin,
    End,
}

/// A raw event pushed into the aggregation inbox.
///
/// Emotion labels arrive as strings and are validated inside the aggregation
/// task so that malformed input is counted there rather than filtered
/// upstream.
#[derive(Clone, Debug)]
pub enum InputEvent {
    Emotion {
        label: String,
        at: DateTime<Utc>,
    },
    Touch {
        edge: TouchEdge,
        electrode: u32,
        at: DateTime<Utc>,
    },
    /// Drain what is queued, flush, and stop the aggregation task.
    Shutdown,
}

impl InputEvent {
    pub fn emotion(label: impl Into<String>, at: DateTime<Utc>) -> Self {
        InputEvent::Emotion {
            label: label.into(),
            at,
        }
    }

    pub fn touch(edge: TouchEdge, electrode: u32, at: DateTime<Utc>) -> Self {
        InputEvent::Touch {
            edge,
            electrode,
            at,
        }
    }
}
