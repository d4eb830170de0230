//! Aggregation core for the emotion lighting installation.
//!
//! Sensors push [`InputEvent`]s into a bounded [`inbox`](inbox::Inbox); a
//! single task owns the [`Aggregator`] and is the only writer of the live
//! counters. Whenever the state materially changes the task emits an
//! immutable [`Snapshot`] downstream (broadcast hub, lights, store).

pub mod aggregator;
pub mod emotion;
pub mod event;
pub mod inbox;
pub mod state;
pub mod stats;

pub use aggregator::{run, Aggregator, AggregatorConfig, AggregatorHandle, Outputs};
pub use emotion::Emotion;
pub use event::{InputEvent, TouchEdge};
pub use state::{DashboardState, Snapshot};
pub use stats::{AllTimeStats, DayStats, EmotionCounts};
