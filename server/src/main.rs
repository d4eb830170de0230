use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use lights::{AdapterConfig, LoggingDriver};
use server::{router, spawn_fanout, AppState, Hub};
use store::{Store, WorkerConfig};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{error, info};
use tracker::{Aggregator, AggregatorConfig, Outputs};

#[derive(Parser)]
#[command(name = "emotion-lighting", about = "Emotion lighting aggregation server")]
struct Args {
    /// Listen address for the dashboard and sensor endpoints
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: SocketAddr,
    /// SQLite database path
    #[arg(long, default_value = "emotion_data.db")]
    db: PathBuf,
    /// Aggregation heartbeat in milliseconds
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
    /// Seconds without a classification before reverting to no_face
    #[arg(long, default_value_t = 5)]
    freshness_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    // A corrupt store is fatal: better to stop than to run with partial
    // history and overwrite it later.
    let store = match Store::open(&args.db) {
        Ok(store) => store,
        Err(err) => {
            error!(%err, db = %args.db.display(), "cannot open statistics store");
            std::process::exit(1);
        }
    };
    let recovered = match store.load_or_init(Utc::now().date_naive()) {
        Ok(recovered) => recovered,
        Err(err) => {
            error!(%err, "statistics store is unreadable");
            std::process::exit(1);
        }
    };
    info!(
        date = %recovered.today.date,
        total_emotions = recovered.all_time.total_emotions(),
        "statistics loaded"
    );

    let config = AggregatorConfig {
        freshness_window: Duration::from_secs(args.freshness_secs),
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        ..Default::default()
    };
    let aggregator = Aggregator::new(recovered.today, recovered.all_time, &config);
    let initial = aggregator.snapshot(Utc::now());

    let (snapshot_tx, snapshot_rx) = mpsc::channel(32);
    let (store_tx, store_rx) = mpsc::channel(64);
    let store_worker = store::spawn_worker(store, store_rx, WorkerConfig::default());
    let (events, aggregation) = tracker::run(
        aggregator,
        &config,
        Outputs {
            snapshots: snapshot_tx,
            store: store_tx,
        },
    );

    let hub = Hub::new(64);
    let (latest_tx, latest_rx) = watch::channel(Some(initial));
    let fanout = spawn_fanout(snapshot_rx, hub.clone(), latest_tx);
    let lights_task = lights::run_adapter(
        LoggingDriver::default(),
        latest_rx.clone(),
        AdapterConfig::default(),
    );

    let app = router(AppState {
        hub,
        latest: latest_rx,
        events: events.clone(),
    });
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .expect("bind server");
    info!("listening on {}", args.addr);

    let (close_tx, close_rx) = oneshot::channel::<()>();
    let web = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = close_rx.await;
            })
            .await
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "signal handler failed");
    }
    info!("shutting down");

    // Stop accepting events, drain, flush today's row, then close viewers.
    events.shutdown();
    let _ = aggregation.await;
    let _ = fanout.await;
    let _ = store_worker.await;
    let _ = close_tx.send(());
    let _ = web.await;
    let _ = lights_task.await;
    info!("shutdown complete");
}
