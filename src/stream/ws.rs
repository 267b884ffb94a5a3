//! Websocket implementation of the live channel
//!
//! A background task owns the socket. It connects, forwards the newest
//! pending outbound frame, parses inbound events, and reconnects with
//! exponential backoff whenever the transport drops. The capture loop never
//! sees reconnection; it only observes `is_connected()` and events.

use super::channel::{ChannelConnector, ChannelEvent, SendOutcome, StreamChannel};
use super::protocol::{ClientEvent, FrameMessage, ServerEvent};
use crate::config::StreamConfig;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Inbound events buffered between drains; older events are dropped first
pub const EVENT_BUFFER: usize = 64;

/// Reconnect delay policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay following `current`
    pub fn next(&self, current: Duration) -> Duration {
        (current * 2).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(8))
    }
}

/// Opens websocket channels to a fixed URL
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    backoff: Backoff,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            url: url.into(),
            backoff,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.url.clone(),
            Backoff::new(
                Duration::from_millis(config.reconnect_initial_ms),
                Duration::from_millis(config.reconnect_max_ms),
            ),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChannelConnector for WsConnector {
    fn open(&self) -> Box<dyn StreamChannel> {
        Box::new(WsChannel::spawn(self.url.clone(), self.backoff))
    }
}

/// The one outbound frame waiting for the socket. Offering a frame replaces
/// whatever has not been sent yet.
#[derive(Default)]
struct PendingFrame {
    slot: Mutex<Option<FrameMessage>>,
    ready: Notify,
}

impl PendingFrame {
    /// Store `frame`; returns true if it replaced an unsent frame
    fn offer(&self, frame: FrameMessage) -> bool {
        let replaced = self.slot.lock().replace(frame).is_some();
        self.ready.notify_one();
        replaced
    }

    fn take(&self) -> Option<FrameMessage> {
        self.slot.lock().take()
    }

    fn clear(&self) {
        self.slot.lock().take();
    }
}

/// Client-side handle to a websocket channel task
pub struct WsChannel {
    outbound: Option<Arc<PendingFrame>>,
    events: broadcast::Receiver<ChannelEvent>,
    connected: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WsChannel {
    /// Spawn the connection task. Must be called within a tokio runtime.
    pub fn spawn(url: String, backoff: Backoff) -> Self {
        let pending = Arc::new(PendingFrame::default());
        let (events_tx, events_rx) = broadcast::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let connected = Arc::new(AtomicBool::new(false));

        tracing::info!("Opening live channel to {}", url);
        let task = tokio::spawn(run_connection(
            url,
            backoff,
            pending.clone(),
            events_tx,
            connected.clone(),
            shutdown_rx,
        ));

        Self {
            outbound: Some(pending),
            events: events_rx,
            connected,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Whether the background task has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl StreamChannel for WsChannel {
    fn try_send_frame(&mut self, frame: FrameMessage) -> SendOutcome {
        let Some(pending) = &self.outbound else {
            return SendOutcome::DroppedClosed;
        };
        if self.is_finished() {
            return SendOutcome::DroppedClosed;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return SendOutcome::DroppedDisconnected;
        }

        if pending.offer(frame) {
            tracing::trace!("Replaced an unsent frame with a newer one");
        }
        SendOutcome::Sent
    }

    fn try_recv_event(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.events.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Dropped {} stale channel events", skipped);
                }
                Err(_) => return None,
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.outbound.is_some() && self.connected.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            tracing::info!("Live channel closed");
        }
        self.outbound = None;
        self.connected.store(false, Ordering::SeqCst);
        // The task exits on its own after sending a close frame
        self.task.take();
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    url: String,
    backoff: Backoff,
    pending: Arc<PendingFrame>,
    events_tx: broadcast::Sender<ChannelEvent>,
    connected: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut delay = backoff.initial;

    loop {
        let attempt = tokio::select! {
            _ = &mut shutdown => return,
            result = connect_async(url.as_str()) => result,
        };

        match attempt {
            Ok((socket, _response)) => {
                tracing::info!("Connected to live channel {}", url);
                delay = backoff.initial;
                connected.store(true, Ordering::SeqCst);
                let _ = events_tx.send(ChannelEvent::Connected);

                let (mut sink, mut stream) = socket.split();

                loop {
                    tokio::select! {
                        _ = &mut shutdown => {
                            connected.store(false, Ordering::SeqCst);
                            let _ = sink.send(Message::Close(None)).await;
                            return;
                        }
                        _ = pending.ready.notified() => {
                            let Some(frame) = pending.take() else {
                                continue;
                            };
                            let text = match serde_json::to_string(&ClientEvent::LiveFrame(frame)) {
                                Ok(text) => text,
                                Err(e) => {
                                    tracing::warn!("Failed to serialize frame: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                tracing::warn!("Frame delivery failed: {}", e);
                                let _ = events_tx.send(ChannelEvent::DeliveryFailed(e.to_string()));
                                break;
                            }
                        }
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(ServerEvent::ProcessedFrame(feedback)) => {
                                        let _ = events_tx.send(ChannelEvent::Feedback(feedback));
                                    }
                                    Ok(ServerEvent::Error(err)) => {
                                        tracing::warn!("Live channel server error: {}", err.message);
                                        let _ = events_tx.send(ChannelEvent::ServerError(err.message));
                                    }
                                    Err(e) => {
                                        tracing::debug!("Ignoring unrecognized message: {}", e);
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!("Live channel closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!("Live channel read error: {}", e);
                                let _ = events_tx.send(ChannelEvent::DeliveryFailed(e.to_string()));
                                break;
                            }
                        }
                    }
                }

                connected.store(false, Ordering::SeqCst);
                let _ = events_tx.send(ChannelEvent::Disconnected);
            }
            Err(e) => {
                tracing::debug!("Live channel connect to {} failed: {}", url, e);
            }
        }

        // A frame left over from the lost connection is stale
        pending.clear();

        tracing::debug!("Reconnecting live channel in {:?}", delay);
        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = backoff.next(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_caps() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(8));
        let mut delay = backoff.initial;
        let mut seen = vec![delay];
        for _ in 0..6 {
            delay = backoff.next(delay);
            seen.push(delay);
        }
        assert_eq!(seen[1], Duration::from_secs(1));
        assert_eq!(seen[4], Duration::from_secs(8));
        assert_eq!(*seen.last().unwrap(), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_unreachable_server_drops_frames() {
        // Nothing listens on port 9 (discard) locally
        let mut channel = WsChannel::spawn("ws://127.0.0.1:9/live".to_string(), Backoff::default());

        let outcome = channel.try_send_frame(FrameMessage {
            frame: "data:image/jpeg;base64,AA".to_string(),
            coach_video_id: "vid".to_string(),
        });
        assert_eq!(outcome, SendOutcome::DroppedDisconnected);
        assert!(!channel.is_connected());

        channel.close();
        channel.close();
        assert_eq!(
            channel.try_send_frame(FrameMessage {
                frame: String::new(),
                coach_video_id: "vid".to_string(),
            }),
            SendOutcome::DroppedClosed
        );
    }
}
