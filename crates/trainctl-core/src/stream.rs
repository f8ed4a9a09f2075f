//! Streaming session.
//!
//! Owns the lifecycle of the long-lived channel to the training backend:
//! `Connecting -> Open -> Closed`, with `Errored` reachable from any state.
//! `Closed` and `Errored` are terminal; there is no reconnect. A new
//! [`StreamingSession`] has to be constructed to try again.
//!
//! The concrete transport runs in the background and reports what happens on
//! the wire as [`TransportEvent`]s. The session folds those events into its
//! state one at a time.

use crate::command::StartTrainingCommand;
use crate::error::StreamError;
use crate::protocol::{InboundMessage, decode_message};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// State of the streaming channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamConnection {
    Connecting,
    Open,
    Closed,
    Errored(String),
}

impl StreamConnection {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Errored(_))
    }
}

impl std::fmt::Display for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
            Self::Errored(reason) => write!(f, "errored ({reason})"),
        }
    }
}

/// What the transport observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// A binary frame; decoded as UTF-8 JSON by the session.
    Binary(Vec<u8>),
    Closed,
    Error(String),
}

/// Control side of a running transport: outbound frames and a shutdown signal.
#[derive(Debug)]
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TransportHandle {
    #[must_use]
    pub fn new(outbound: mpsc::UnboundedSender<String>, shutdown: oneshot::Sender<()>) -> Self {
        Self { outbound, shutdown: Some(shutdown) }
    }

    fn transmit(&self, frame: String) -> Result<(), StreamError> {
        self.outbound.send(frame).map_err(|_| StreamError::ChannelNotReady)
    }

    /// Signals the transport to close. Returns `false` if already released.
    fn release(&mut self) -> bool {
        match self.shutdown.take() {
            Some(shutdown) => {
                // The transport may already be gone; that still counts as released.
                let _ = shutdown.send(());
                true
            }
            None => false,
        }
    }
}

/// Opens a channel to `endpoint` and reports its events on `events`.
pub trait StreamTransport: Send + Sync {
    fn open(&self, endpoint: &str, events: mpsc::UnboundedSender<TransportEvent>) -> TransportHandle;
}

/// Result of folding one transport event into the session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// The channel just opened; commands may be sent.
    Ready,
    /// A decoded message arrived while open.
    Inbound(InboundMessage),
    /// A message was dropped because it could not be decoded.
    Dropped(StreamError),
    /// The event changed nothing (late event, message while not open).
    Ignored,
    Closed,
    Errored(String),
}

/// The long-lived channel and its state.
#[derive(Debug)]
pub struct StreamingSession {
    endpoint: String,
    state: StreamConnection,
    handle: TransportHandle,
}

impl StreamingSession {
    /// Starts connecting to `endpoint`. The session is `Connecting` until the
    /// transport reports `Opened`.
    pub fn connect(
        transport: &dyn StreamTransport,
        endpoint: &str,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        info!(endpoint = %endpoint, "Connecting training stream");
        let handle = transport.open(endpoint, events);
        Self { endpoint: endpoint.to_string(), state: StreamConnection::Connecting, handle }
    }

    #[must_use]
    pub fn state(&self) -> &StreamConnection {
        &self.state
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.is_open()
    }

    /// Folds one transport event into the session state.
    pub fn on_transport_event(&mut self, event: TransportEvent) -> StreamUpdate {
        if let StreamConnection::Errored(_) = self.state {
            debug!(event = ?event, "Ignoring transport event after error");
            return StreamUpdate::Ignored;
        }

        match event {
            TransportEvent::Opened => {
                if self.state != StreamConnection::Connecting {
                    debug!(state = %self.state, "Ignoring late open");
                    return StreamUpdate::Ignored;
                }
                info!(endpoint = %self.endpoint, "Training stream open");
                self.state = StreamConnection::Open;
                StreamUpdate::Ready
            }
            TransportEvent::Message(raw) => self.on_message(&raw),
            TransportEvent::Binary(data) => self.on_binary(data),
            TransportEvent::Closed => {
                if self.state == StreamConnection::Closed {
                    return StreamUpdate::Ignored;
                }
                info!(endpoint = %self.endpoint, "Training stream closed");
                self.state = StreamConnection::Closed;
                StreamUpdate::Closed
            }
            TransportEvent::Error(reason) => {
                error!(endpoint = %self.endpoint, error = %reason, "Training stream error");
                self.state = StreamConnection::Errored(reason.clone());
                StreamUpdate::Errored(reason)
            }
        }
    }

    /// Decodes one inbound frame. Only frames received while open are acted on.
    pub fn on_message(&mut self, raw: &str) -> StreamUpdate {
        if !self.state.is_open() {
            warn!(state = %self.state, "Dropping message received while stream not open");
            return StreamUpdate::Ignored;
        }

        match decode_message(raw) {
            Ok(InboundMessage::Unrecognized(status)) => {
                debug!(status = ?status, "Ignoring unrecognized stream message");
                StreamUpdate::Ignored
            }
            Ok(message) => StreamUpdate::Inbound(message),
            Err(e) => {
                warn!(error = %e, "Dropping stream message");
                StreamUpdate::Dropped(e)
            }
        }
    }

    /// Decodes one binary frame. Invalid UTF-8 is dropped like any other
    /// undecodable frame.
    pub fn on_binary(&mut self, data: Vec<u8>) -> StreamUpdate {
        if !self.state.is_open() {
            warn!(state = %self.state, "Dropping message received while stream not open");
            return StreamUpdate::Ignored;
        }

        match String::from_utf8(data) {
            Ok(raw) => self.on_message(&raw),
            Err(e) => {
                let e = StreamError::DecodeError(format!("binary frame is not UTF-8: {e}"));
                warn!(error = %e, "Dropping stream message");
                StreamUpdate::Dropped(e)
            }
        }
    }

    /// Sends `command` if the channel is open.
    ///
    /// Nothing is queued: a command rejected with `ChannelNotReady` is lost.
    pub fn send(&self, command: &StartTrainingCommand) -> Result<(), StreamError> {
        if !self.state.is_open() {
            warn!(state = %self.state, "Refusing to send on a stream that is not open");
            return Err(StreamError::ChannelNotReady);
        }
        debug!(epochs = command.epochs, "Sending start command");
        self.handle.transmit(command.to_frame())
    }

    /// Releases the transport. Only the first call does anything; it returns
    /// `true` when it did.
    pub fn close(&mut self) -> bool {
        if !self.handle.release() {
            return false;
        }
        if !self.state.is_terminal() {
            self.state = StreamConnection::Closed;
        }
        info!(endpoint = %self.endpoint, "Training stream released");
        true
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.close();
    }
}
