use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use tracker::{Emotion, Snapshot};

use crate::{color_for, LedDriver, Rgb};

#[derive(Clone, Debug)]
pub struct AdapterConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(800),
        }
    }
}

/// Drive the strip from the latest snapshot.
///
/// The watch channel always holds only the newest state, so the driver is
/// written at most once per state change no matter how fast snapshots
/// arrive. Identical consecutive emotions are suppressed entirely.
pub fn run_adapter<D: LedDriver>(
    mut driver: D,
    mut rx: watch::Receiver<Option<Snapshot>>,
    config: AdapterConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut applied: Option<Option<Emotion>> = None;
        // Apply whatever state was seeded before the adapter started.
        rx.mark_changed();
        while rx.changed().await.is_ok() {
            let target = rx.borrow_and_update().as_ref().map(|s| s.current_emotion);
            let Some(target) = target else { continue };
            if applied == Some(target) {
                continue;
            }
            let (color, brightness) = color_for(target);
            if write_with_retry(&mut driver, color, brightness, &config).await {
                applied = Some(target);
            } else {
                // Leave `applied` untouched so the next state change (or a
                // repeat of this one) tries the driver again.
                error!(?target, "led driver write failed, retries exhausted");
            }
        }
        debug!("lights adapter stopped");
    })
}

async fn write_with_retry<D: LedDriver>(
    driver: &mut D,
    color: Rgb,
    brightness: f32,
    config: &AdapterConfig,
) -> bool {
    let mut backoff = config.initial_backoff;
    for attempt in 0..=config.max_retries {
        match driver.set_color(color, brightness).await {
            Ok(()) => return true,
            Err(err) => {
                warn!(%err, attempt, "led driver write failed");
                if attempt < config.max_retries {
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(config.max_backoff);
                }
            }
        }
    }
    false
}
