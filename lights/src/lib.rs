//! Actuation: turn the current emotion into an LED strip color.
//!
//! The physical strip sits behind the [`LedDriver`] trait; the [`adapter`]
//! task watches the latest snapshot and writes to the driver only when the
//! emotion actually changed, so a stuck LED bus can never hold up the rest
//! of the installation.

use async_trait::async_trait;
use tracker::Emotion;
use tracing::info;

pub mod adapter;

pub use adapter::{run_adapter, AdapterConfig};

/// An RGB triple as accepted by the strip driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("led bus i/o failed: {0}")]
    Io(String),
}

/// Fire-and-forget interface to the physical strip. Implementations must
/// tolerate being called a few times per second.
#[async_trait]
pub trait LedDriver: Send + 'static {
    async fn set_color(&mut self, color: Rgb, brightness: f32) -> Result<(), DriverError>;
}

/// Target light state for one emotion, colors as in the installed strip.
pub fn color_for(emotion: Option<Emotion>) -> (Rgb, f32) {
    match emotion {
        Some(Emotion::Happy) => (Rgb(128, 128, 0), 0.5),
        Some(Emotion::Sad) => (Rgb(0, 0, 128), 0.5),
        Some(Emotion::Angry) => (Rgb(128, 0, 0), 0.5),
        Some(Emotion::Neutral) => (Rgb(128, 128, 128), 0.5),
        Some(Emotion::Fear) => (Rgb(64, 0, 64), 0.5),
        Some(Emotion::Surprise) => (Rgb(0, 128, 128), 0.5),
        Some(Emotion::Disgust) => (Rgb(0, 64, 0), 0.5),
        // No face in view: dim standby shimmer.
        None => (Rgb(128, 128, 128), 0.1),
    }
}

/// Driver that only logs, used when no strip hardware is attached.
#[derive(Default)]
pub struct LoggingDriver;

#[async_trait]
impl LedDriver for LoggingDriver {
    async fn set_color(&mut self, color: Rgb, brightness: f32) -> Result<(), DriverError> {
        info!(?color, brightness, "led strip set");
        Ok(())
    }
}
