use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use parley::kernel::event::Event;
use parley::protocol::envelope::ClientEnvelope;
use parley::transport::{Channel, ChannelState, SendOutcome};

const WAIT: Duration = Duration::from_secs(5);

/// Accepts a single websocket connection. Text frames the client sends come
/// out of the returned receiver; messages pushed into the sender go to the client.
async fn spawn_endpoint() -> (String, mpsc::UnboundedReceiver<String>, mpsc::UnboundedSender<Message>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (received_tx, received_rx) = mpsc::unbounded_channel();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();
        loop {
            tokio::select! {
                Some(msg) = push_rx.recv() => {
                    let closing = matches!(msg, Message::Close(_));
                    let _ = write.send(msg).await;
                    if closing {
                        break;
                    }
                }
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = received_tx.send(text.as_str().to_string());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    (url, received_rx, push_tx)
}

/// Accepts every websocket connection and keeps it alive, counting handshakes.
async fn spawn_counting_endpoint() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                while let Some(Ok(msg)) = ws.next().await {
                    if msg.is_close() {
                        break;
                    }
                }
            });
        }
    });

    (url, connections)
}

async fn wait_for_connections(connections: &AtomicUsize, expected: usize) {
    timeout(WAIT, async {
        while connections.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("endpoint never saw the connection");
    assert_eq!(connections.load(Ordering::SeqCst), expected);
}

async fn next_event(events: &mut mpsc::Receiver<Event>) -> Event {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("event queue closed")
}

#[tokio::test]
async fn test_send_while_closed_is_dropped() {
    let channel = Channel::new();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.send(ClientEnvelope::text("hello")), SendOutcome::Dropped);
    assert_eq!(channel.state(), ChannelState::Closed);
}

#[tokio::test]
async fn test_failed_open_reports_closed() {
    // Grab a free port and release it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut channel = Channel::new();
    let (tx, mut events) = mpsc::channel(8);
    assert!(channel.open(&url, tx));
    assert!(matches!(next_event(&mut events).await, Event::ChannelClosed));
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.send(ClientEnvelope::text("hello")), SendOutcome::Dropped);
}

#[tokio::test]
async fn test_open_returns_while_handshake_is_pending() {
    // Accepts the TCP connection but never answers the websocket upgrade.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let held = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });

    let mut channel = Channel::new();
    let (tx, mut events) = mpsc::channel(8);
    assert!(channel.open(&url, tx.clone()));
    assert_eq!(channel.state(), ChannelState::Connecting);
    assert_eq!(channel.send(ClientEnvelope::text("early")), SendOutcome::Dropped);

    // Still connecting: a second open is ignored.
    assert!(!channel.open(&url, tx));
    assert!(timeout(Duration::from_millis(200), events.recv()).await.is_err());
    assert_eq!(channel.state(), ChannelState::Connecting);

    channel.close();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(matches!(next_event(&mut events).await, Event::ChannelClosed));
    held.abort();
}

#[tokio::test]
async fn test_round_trip_with_endpoint() {
    let (url, mut received, push) = spawn_endpoint().await;
    let (tx, mut events) = mpsc::channel(16);
    let mut channel = Channel::new();

    assert!(channel.open(&url, tx));
    assert!(matches!(next_event(&mut events).await, Event::ChannelOpened));
    assert_eq!(channel.state(), ChannelState::Open);

    assert_eq!(channel.send(ClientEnvelope::text("describe the screen")), SendOutcome::Sent);
    let json = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["clientContent"]["turnComplete"], true);
    assert_eq!(value["clientContent"]["turns"][0]["parts"][0]["text"], "describe the screen");

    push.send(Message::text(r#"{"serverContent":{"turnComplete":true}}"#.to_string())).unwrap();
    match next_event(&mut events).await {
        Event::Inbound(envelope) => assert!(envelope.server_content.unwrap().turn_complete),
        other => panic!("expected inbound envelope, got {:?}", other),
    }

    // Malformed messages are skipped; the next good one still arrives.
    push.send(Message::text("not json".to_string())).unwrap();
    push.send(Message::text(r#"{"serverContent":{"modelTurn":{"parts":[{"text":"hi"}]}}}"#.to_string()))
        .unwrap();
    match next_event(&mut events).await {
        Event::Inbound(envelope) => assert_eq!(envelope.server_content.unwrap().texts(), vec!["hi".to_string()]),
        other => panic!("expected inbound envelope, got {:?}", other),
    }

    push.send(Message::Close(None)).unwrap();
    assert!(matches!(next_event(&mut events).await, Event::ChannelClosed));
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.send(ClientEnvelope::text("too late")), SendOutcome::Dropped);
}

#[tokio::test]
async fn test_open_while_open_is_a_no_op() {
    let (url, connections) = spawn_counting_endpoint().await;
    let (tx, mut events) = mpsc::channel(16);
    let mut channel = Channel::new();

    assert!(channel.open(&url, tx.clone()));
    assert!(matches!(next_event(&mut events).await, Event::ChannelOpened));

    assert!(!channel.open(&url, tx));
    assert_eq!(channel.state(), ChannelState::Open);
    assert!(timeout(Duration::from_millis(200), events.recv()).await.is_err(), "no second ChannelOpened");
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_local_close_reports_closed() {
    let (url, _received, _push) = spawn_endpoint().await;
    let (tx, mut events) = mpsc::channel(16);
    let mut channel = Channel::new();

    assert!(channel.open(&url, tx));
    assert!(matches!(next_event(&mut events).await, Event::ChannelOpened));

    channel.close();
    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.send(ClientEnvelope::text("after close")), SendOutcome::Dropped);
    assert!(matches!(next_event(&mut events).await, Event::ChannelClosed));
}

#[tokio::test]
async fn test_reopen_after_close_reports_close_first() {
    let (url, connections) = spawn_counting_endpoint().await;
    let (tx, mut events) = mpsc::channel(16);
    let mut channel = Channel::new();

    assert!(channel.open(&url, tx.clone()));
    assert!(matches!(next_event(&mut events).await, Event::ChannelOpened));

    channel.close();
    assert!(channel.open(&url, tx));

    assert!(matches!(next_event(&mut events).await, Event::ChannelClosed));
    assert!(matches!(next_event(&mut events).await, Event::ChannelOpened));
    assert_eq!(channel.state(), ChannelState::Open);
    wait_for_connections(&connections, 2).await;
    assert_eq!(channel.send(ClientEnvelope::text("again")), SendOutcome::Sent);
}
