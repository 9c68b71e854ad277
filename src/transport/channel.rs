//! The single live channel to the streaming endpoint.
//!
//! Sends are fire-and-forget: nothing is retried, nothing reconnects, and
//! anything sent while the channel is not open is dropped on the floor.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::kernel::event::Event;
use crate::protocol::envelope::{ClientEnvelope, ServerEnvelope};

/// Outbound queue depth. A full queue drops the envelope.
const OUTBOUND_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Connecting,
    Open,
}

impl ChannelState {
    fn as_u8(self) -> u8 {
        match self {
            ChannelState::Closed => 0,
            ChannelState::Connecting => 1,
            ChannelState::Open => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChannelState::Connecting,
            2 => ChannelState::Open,
            _ => ChannelState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped,
}

pub struct Channel {
    state: Arc<AtomicU8>,
    outbound: Option<mpsc::Sender<ClientEnvelope>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ChannelState::Closed.as_u8())),
            outbound: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Start connecting to `url` and return immediately. A no-op unless the
    /// channel is closed; returns whether a connection attempt was started.
    ///
    /// The outcome arrives on `events`: `ChannelOpened` once the handshake
    /// completes, `ChannelClosed` when it fails or the connection later ends.
    /// A previous connection finishes (and reports `ChannelClosed`) before
    /// the new one is attempted.
    pub fn open(&mut self, url: &str, events: mpsc::Sender<Event>) -> bool {
        if self.state() != ChannelState::Closed {
            debug!("Channel already {:?}; ignoring open", self.state());
            return false;
        }

        // Each connection gets its own state cell so a finishing predecessor
        // cannot overwrite it.
        let state = Arc::new(AtomicU8::new(ChannelState::Connecting.as_u8()));
        let (tx, rx) = mpsc::channel::<ClientEnvelope>(OUTBOUND_CAPACITY);
        let cancel = CancellationToken::new();

        self.state = state.clone();
        self.outbound = Some(tx);
        self.cancel = cancel.clone();

        let previous = self.task.take();
        let url = url.to_string();
        self.task = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            connect_and_serve(url, state, rx, cancel, events).await;
        }));
        true
    }

    /// Queue an envelope. Dropped without error unless the channel is open.
    pub fn send(&self, envelope: ClientEnvelope) -> SendOutcome {
        if !self.is_open() {
            return SendOutcome::Dropped;
        }
        let Some(outbound) = &self.outbound else {
            return SendOutcome::Dropped;
        };
        match outbound.try_send(envelope) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                debug!("Envelope dropped: {}", e);
                SendOutcome::Dropped
            }
        }
    }

    pub fn close(&mut self) {
        if self.state() == ChannelState::Closed {
            return;
        }
        self.set_state(ChannelState::Closed);
        self.cancel.cancel();
        self.outbound = None;
    }

    fn set_state(&self, state: ChannelState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

async fn connect_and_serve(
    url: String,
    state: Arc<AtomicU8>,
    mut rx: mpsc::Receiver<ClientEnvelope>,
    cancel: CancellationToken,
    events: mpsc::Sender<Event>,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => None,
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((ws, _response)) => Some(ws),
            Err(e) => {
                warn!("Failed to connect to {}: {}", url, e);
                None
            }
        },
    };
    // `close()` during the handshake has already moved the state off Connecting.
    let opened = connected.filter(|_| {
        state
            .compare_exchange(
                ChannelState::Connecting.as_u8(),
                ChannelState::Open.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    });
    let Some(ws) = opened else {
        state.store(ChannelState::Closed.as_u8(), Ordering::SeqCst);
        let _ = events.send(Event::ChannelClosed).await;
        return;
    };

    info!("Channel open: {}", url);
    let (mut sink, mut stream) = ws.split();
    let _ = events.send(Event::ChannelOpened).await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            Some(envelope) = rx.recv() => {
                let json = match serde_json::to_string(&envelope) {
                    Ok(j) => j,
                    Err(e) => {
                        error!("Failed to serialize envelope: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!("Channel send failed: {}", e);
                    break;
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(envelope) = ServerEnvelope::parse(text.as_str()) {
                            let _ = events.send(Event::Inbound(envelope)).await;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        // Some proxies forward the JSON as binary frames.
                        match std::str::from_utf8(&bytes) {
                            Ok(text) => {
                                if let Some(envelope) = ServerEnvelope::parse(text) {
                                    let _ = events.send(Event::Inbound(envelope)).await;
                                }
                            }
                            Err(_) => debug!("Ignoring non-UTF-8 binary frame ({} bytes)", bytes.len()),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Channel closed by peer");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Channel error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Anything still queued is dropped with the receiver.
    state.store(ChannelState::Closed.as_u8(), Ordering::SeqCst);
    drop(rx);
    let _ = events.send(Event::ChannelClosed).await;
}
