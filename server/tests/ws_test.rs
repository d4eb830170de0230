use chrono::Utc;
use futures_util::StreamExt;
use server::{router, spawn_fanout, AppState, Hub};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracker::{Aggregator, AggregatorConfig, AllTimeStats, DayStats, Outputs, TouchEdge};

struct Fixture {
    addr: std::net::SocketAddr,
    events: tracker::AggregatorHandle,
    _store_rx: mpsc::Receiver<DayStats>,
}

async fn start() -> Fixture {
    let config = AggregatorConfig {
        tick_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let aggregator = Aggregator::new(
        DayStats::empty(Utc::now().date_naive()),
        AllTimeStats::default(),
        &config,
    );

    let (snapshot_tx, snapshot_rx) = mpsc::channel(32);
    let (store_tx, store_rx) = mpsc::channel(32);
    let (events, _aggregation) = tracker::run(
        aggregator,
        &config,
        Outputs {
            snapshots: snapshot_tx,
            store: store_tx,
        },
    );

    let hub = Hub::new(8);
    let (latest_tx, latest_rx) = watch::channel(None);
    spawn_fanout(snapshot_rx, hub.clone(), latest_tx);

    let app = router(AppState {
        hub,
        latest: latest_rx,
        events: events.clone(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Fixture {
        addr,
        events,
        _store_rx: store_rx,
    }
}

async fn next_payload(
    ws: &mut (impl futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> serde_json::Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no payload published")
            .expect("socket closed")
            .expect("socket errored");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn viewer_receives_state_payloads() {
    let fixture = start().await;
    let (mut ws, _) = connect_async(format!("ws://{}/ws", fixture.addr))
        .await
        .unwrap();
    // Give the upgrade handler a moment to subscribe.
    sleep(Duration::from_millis(100)).await;

    fixture.events.on_emotion("happy", Utc::now());
    let payload = next_payload(&mut ws).await;
    assert_eq!(payload["emotion"]["current"], "happy");
    assert_eq!(payload["emotion"]["counts"]["happy"], 1);
    assert_eq!(payload["touch"]["today_touches"], 0);
    assert_eq!(payload["total_stats"]["dominant_emotion"], "happy");

    fixture.events.on_touch(TouchEdge::Begin, Utc::now());
    let payload = next_payload(&mut ws).await;
    assert_eq!(payload["touch"]["active_touches"], 1);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn viewers_are_isolated_from_each_other() {
    let fixture = start().await;
    let (mut first, _) = connect_async(format!("ws://{}/ws", fixture.addr))
        .await
        .unwrap();
    let (second, _) = connect_async(format!("ws://{}/ws", fixture.addr))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    // One viewer drops without a close handshake; the other keeps getting
    // updates.
    drop(second);
    fixture.events.on_emotion("surprise", Utc::now());
    let payload = next_payload(&mut first).await;
    assert_eq!(payload["emotion"]["current"], "surprise");
}

#[tokio::test]
async fn reconnected_viewer_gets_next_snapshot_only() {
    let fixture = start().await;
    fixture.events.on_emotion("sad", Utc::now());
    sleep(Duration::from_millis(200)).await;

    // Connecting after the publish: no history is replayed.
    let (mut ws, _) = connect_async(format!("ws://{}/ws", fixture.addr))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;
    fixture.events.on_emotion("angry", Utc::now());
    let payload = next_payload(&mut ws).await;
    assert_eq!(payload["emotion"]["current"], "angry");
}
