//! End-to-end tests for the resource stream gateway
//!
//! Each test runs a real axum server on a loopback port and talks to it with
//! a tokio-tungstenite client.

use futures::{SinkExt, StreamExt};
use kubecast_core::{intake, Broadcaster, Envelope, Operation, Publisher};
use kubecast_gateway::{router, GatewayState, HeartbeatSettings, RESOURCES_PATH};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn fast_heartbeat() -> HeartbeatSettings {
    HeartbeatSettings::from_millis(50, 50, 300, 100)
}

async fn serve(settings: HeartbeatSettings) -> (SocketAddr, Publisher, Broadcaster) {
    let (publisher, rx) = intake::channel(64);
    let broadcaster = Broadcaster::new(rx);
    let app = router(GatewayState::new(broadcaster.clone(), settings));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, publisher, broadcaster)
}

async fn connect(addr: SocketAddr) -> Client {
    let url = format!("ws://{addr}{RESOURCES_PATH}");
    let (client, _response) = connect_async(url).await.unwrap();
    client
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let started = Instant::now();
    while !condition() {
        assert!(started.elapsed() < WAIT, "timed out waiting for {what}");
        sleep(Duration::from_millis(20)).await;
    }
}

#[derive(Debug)]
enum ClientEvent {
    Envelope(Envelope),
    Closed(Option<CloseCode>),
}

/// Keep reading (which also answers pings) and report what arrives.
fn spawn_reader(mut client: Client) -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let envelope: Envelope = serde_json::from_str(&text).unwrap();
                    let _ = tx.send(ClientEvent::Envelope(envelope));
                }
                Ok(Message::Close(frame)) => {
                    let _ = tx.send(ClientEvent::Closed(frame.map(|f| f.code)));
                    return;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        let _ = tx.send(ClientEvent::Closed(None));
    });
    rx
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("no event from server")
        .expect("reader ended")
}

#[tokio::test]
async fn test_streams_envelopes_to_every_client() {
    let (addr, publisher, broadcaster) = serve(fast_heartbeat()).await;
    let mut first = spawn_reader(connect(addr).await);
    let mut second = spawn_reader(connect(addr).await);
    wait_for("two subscribers", || broadcaster.pool_size() == 2).await;

    let payload = json!({"metadata": {"name": "build-1", "namespace": "ci"}});
    publisher.created("PipelineRun", payload.clone()).await.unwrap();
    publisher.updated("PipelineRun", payload.clone()).await.unwrap();
    publisher.deleted("PipelineRun", payload.clone()).await.unwrap();

    for events in [&mut first, &mut second] {
        for operation in [Operation::Created, Operation::Updated, Operation::Deleted] {
            match next_event(events).await {
                ClientEvent::Envelope(envelope) => {
                    assert_eq!(envelope.kind(), "PipelineRun");
                    assert_eq!(envelope.operation(), operation);
                    assert_eq!(envelope.payload(), &payload);
                }
                other => panic!("expected envelope, got {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn test_silent_client_is_reaped() {
    let (addr, publisher, broadcaster) = serve(HeartbeatSettings::default()).await;
    let mut healthy = spawn_reader(connect(addr).await);
    // Never polled, so it never answers a ping.
    let _silent = connect(addr).await;
    wait_for("two subscribers", || broadcaster.pool_size() == 2).await;

    let started = Instant::now();
    wait_for("silent client removal", || broadcaster.pool_size() == 1).await;
    assert!(started.elapsed() <= Duration::from_secs(4));

    // The healthy client outlives several heartbeat rounds.
    sleep(Duration::from_millis(2500)).await;
    assert_eq!(broadcaster.pool_size(), 1);

    publisher.created("Namespace", json!({"metadata": {"name": "ci"}})).await.unwrap();
    match next_event(&mut healthy).await {
        ClientEvent::Envelope(envelope) => assert_eq!(envelope.kind(), "Namespace"),
        other => panic!("expected envelope, got {other:?}"),
    }
}

#[tokio::test]
async fn test_expiry_closes_connections_normally() {
    let (addr, publisher, broadcaster) = serve(fast_heartbeat()).await;
    let mut events = spawn_reader(connect(addr).await);
    wait_for("subscriber", || broadcaster.pool_size() == 1).await;

    drop(publisher);

    match next_event(&mut events).await {
        ClientEvent::Closed(code) => assert_eq!(code, Some(CloseCode::Normal)),
        other => panic!("expected close, got {other:?}"),
    }
    assert!(broadcaster.expired());
}

#[tokio::test]
async fn test_connect_after_expiry_is_closed() {
    let (addr, publisher, broadcaster) = serve(fast_heartbeat()).await;
    drop(publisher);
    timeout(WAIT, broadcaster.wait_expired()).await.unwrap();

    let mut events = spawn_reader(connect(addr).await);
    match next_event(&mut events).await {
        ClientEvent::Closed(code) => assert_eq!(code, Some(CloseCode::Normal)),
        other => panic!("expected close, got {other:?}"),
    }
    assert_eq!(broadcaster.pool_size(), 0);
}

#[tokio::test]
async fn test_client_close_unsubscribes() {
    let (addr, _publisher, broadcaster) = serve(fast_heartbeat()).await;
    let mut client = connect(addr).await;
    wait_for("subscriber", || broadcaster.pool_size() == 1).await;

    client.close(None).await.unwrap();
    wait_for("unsubscribe", || broadcaster.pool_size() == 0).await;
}

#[tokio::test]
async fn test_dropped_client_unsubscribes() {
    let (addr, _publisher, broadcaster) = serve(fast_heartbeat()).await;
    let client = connect(addr).await;
    wait_for("subscriber", || broadcaster.pool_size() == 1).await;

    drop(client);
    wait_for("unsubscribe", || broadcaster.pool_size() == 0).await;
}

#[tokio::test]
async fn test_inbound_text_is_ignored() {
    let (addr, publisher, broadcaster) = serve(fast_heartbeat()).await;
    let mut client = connect(addr).await;
    wait_for("subscriber", || broadcaster.pool_size() == 1).await;

    client
        .send(Message::Text(r#"{"subscribe":"Secret"}"#.to_string()))
        .await
        .unwrap();
    let mut events = spawn_reader(client);

    publisher.deleted("Secret", json!({"metadata": {"name": "creds"}})).await.unwrap();
    match next_event(&mut events).await {
        ClientEvent::Envelope(envelope) => {
            assert_eq!(envelope.kind(), "Secret");
            assert_eq!(envelope.operation(), Operation::Deleted);
        }
        other => panic!("expected envelope, got {other:?}"),
    }
    assert_eq!(broadcaster.pool_size(), 1);
}

#[tokio::test]
async fn test_backpressured_client_does_not_starve_others() {
    const COUNT: usize = 200;
    let (addr, publisher, broadcaster) = serve(HeartbeatSettings::default()).await;
    let mut healthy = spawn_reader(connect(addr).await);
    // Never read: its TCP buffers fill and the server's send to it blocks.
    let _stuck = connect(addr).await;
    wait_for("two subscribers", || broadcaster.pool_size() == 2).await;

    let blob = "x".repeat(256 * 1024);
    let producer = tokio::spawn(async move {
        for i in 0..COUNT {
            let payload = json!({
                "metadata": {"name": format!("blob-{i}")},
                "data": blob.as_str(),
            });
            publisher.updated("ConfigMap", payload).await.unwrap();
        }
        publisher
    });

    for i in 0..COUNT {
        match timeout(Duration::from_secs(20), healthy.recv()).await {
            Ok(Some(ClientEvent::Envelope(envelope))) => {
                assert_eq!(envelope.payload()["metadata"]["name"], format!("blob-{i}"));
            }
            other => panic!("expected envelope {i}, got {other:?}"),
        }
    }
    let _publisher = timeout(WAIT, producer).await.unwrap().unwrap();
    wait_for("stuck client removal", || broadcaster.pool_size() == 1).await;
}
