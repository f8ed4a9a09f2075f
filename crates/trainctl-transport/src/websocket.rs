//! WebSocket stream transport.
//!
//! Each [`StreamTransport::open`] call spawns one connection task that owns
//! the socket. The task reports everything it sees as [`TransportEvent`]s and
//! writes the frames it receives on the outbound queue. It ends on the first
//! close, error, or shutdown signal; it never reconnects.

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};
use trainctl_core::{StreamTransport, TransportEvent, TransportHandle};

/// Opens WebSocket connections with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl StreamTransport for WebSocketTransport {
    /// Must be called from within a tokio runtime.
    fn open(&self, endpoint: &str, events: mpsc::UnboundedSender<TransportEvent>) -> TransportHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(run_connection(endpoint.to_string(), events, outbound_rx, shutdown_rx));
        TransportHandle::new(outbound_tx, shutdown_tx)
    }
}

async fn run_connection(
    endpoint: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut shutdown: oneshot::Receiver<()>,
) {
    // Send failures below mean the session is gone; the task just winds down.
    let socket = tokio::select! {
        _ = &mut shutdown => {
            debug!(endpoint = %endpoint, "Released before the connection opened");
            return;
        }
        result = connect_async(endpoint.as_str()) => match result {
            Ok((socket, _response)) => socket,
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "WebSocket connect failed");
                let _ = events.send(TransportEvent::Error(e.to_string()));
                return;
            }
        },
    };

    info!(endpoint = %endpoint, "WebSocket connected");
    let _ = events.send(TransportEvent::Opened);
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!(endpoint = %endpoint, "Closing WebSocket");
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(error = %e, "Close frame not delivered");
                }
                break;
            }
            Some(frame) = outbound.recv() => {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    error!(endpoint = %endpoint, error = %e, "WebSocket send failed");
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = events.send(TransportEvent::Binary(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(endpoint = %endpoint, frame = ?frame, "Server closed WebSocket");
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(endpoint = %endpoint, error = %e, "WebSocket read failed");
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
            },
        }
    }
}
