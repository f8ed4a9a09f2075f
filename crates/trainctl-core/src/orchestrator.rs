//! Session orchestrator.
//!
//! Owns the whole session context (staging, upload, stream, metrics) and is
//! the only place where state changes. Three sources feed it:
//!
//! - user commands, as direct method calls (`select_dataset`, `submit_upload`,
//!   `start_training`, `reset`);
//! - upload completions, produced by a spawned request task;
//! - transport events from the streaming channel.
//!
//! The last two arrive through [`SessionOrchestrator::next_event`] and are
//! applied with [`SessionOrchestrator::handle_event`], one at a time and to
//! completion.

use crate::command::{DatasetPaths, RunParameters};
use crate::dataset::{DatasetBlob, DatasetRole, DatasetStaging, UploadReceipt};
use crate::error::{SessionResult, StreamError, UploadFailure};
use crate::metrics::{EpochEvent, MetricsReader, MetricsSeriesStore};
use crate::protocol::{InboundMessage, StreamDatasetInfo};
use crate::stream::{StreamConnection, StreamTransport, StreamUpdate, StreamingSession, TransportEvent};
use crate::upload::{UploadBackend, UploadReply, UploadSession, UploadState, UploadTicket};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An asynchronous input to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    UploadCompleted { ticket: UploadTicket, outcome: Result<UploadReply, UploadFailure> },
    Transport(TransportEvent),
}

/// One-shot, user-facing result of handling an asynchronous event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StreamReady,
    StreamClosed,
    StreamErrored(String),
    UploadSucceeded(UploadReceipt),
    UploadFailed(UploadFailure),
    EpochRecorded(EpochEvent),
    MessageDropped(StreamError),
    DatasetInfo(StreamDatasetInfo),
    ModelSaved(String),
}

/// The session context and its event loop entry points.
pub struct SessionOrchestrator {
    id: Uuid,
    staging: DatasetStaging,
    upload: UploadSession,
    stream: StreamingSession,
    metrics: MetricsSeriesStore,
    saved_model: Option<String>,
    backend: Arc<dyn UploadBackend>,
    uploads_tx: mpsc::UnboundedSender<SessionEvent>,
    uploads_rx: mpsc::UnboundedReceiver<SessionEvent>,
    /// Spawned upload requests whose completion has not been received yet,
    /// stale ones included.
    uploads_outstanding: usize,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("id", &self.id)
            .field("stream", self.stream.state())
            .field("upload", self.upload.state())
            .field("epochs", &self.metrics.len())
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Starts a session: connects the stream to `stream_endpoint` right away.
    pub fn start(
        backend: Arc<dyn UploadBackend>,
        transport: &dyn StreamTransport,
        stream_endpoint: &str,
    ) -> Self {
        let id = Uuid::new_v4();
        info!(session_id = %id, "Starting training session");

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (uploads_tx, uploads_rx) = mpsc::unbounded_channel();
        let stream = StreamingSession::connect(transport, stream_endpoint, transport_tx);

        Self {
            id,
            staging: DatasetStaging::new(),
            upload: UploadSession::new(),
            stream,
            metrics: MetricsSeriesStore::new(),
            saved_model: None,
            backend,
            uploads_tx,
            uploads_rx,
            uploads_outstanding: 0,
            transport_rx,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn staging(&self) -> &DatasetStaging {
        &self.staging
    }

    #[must_use]
    pub fn upload_state(&self) -> &UploadState {
        self.upload.state()
    }

    #[must_use]
    pub fn stream_state(&self) -> &StreamConnection {
        self.stream.state()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsReader {
        self.metrics.reader()
    }

    /// Path of the model the backend reported as saved, if any.
    #[must_use]
    pub fn saved_model(&self) -> Option<&str> {
        self.saved_model.as_deref()
    }

    /// Stages an archive for `role`.
    pub fn select_dataset(&mut self, role: DatasetRole, blob: DatasetBlob) -> SessionResult<()> {
        self.staging.select(role, blob)?;
        Ok(())
    }

    /// Submits both staged archives.
    ///
    /// Preconditions are checked synchronously; on success the request runs
    /// on a spawned task and its completion is delivered via `next_event`.
    /// Must be called from within a tokio runtime.
    pub fn submit_upload(&mut self) -> SessionResult<UploadTicket> {
        let (ticket, request) = self.upload.begin(
            self.staging.slot(DatasetRole::Training),
            self.staging.slot(DatasetRole::Validation),
        )?;

        let backend = Arc::clone(&self.backend);
        let events = self.uploads_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.upload(request).await;
            // The orchestrator may be gone by now; nothing to deliver to.
            let _ = events.send(SessionEvent::UploadCompleted { ticket, outcome });
        });
        self.uploads_outstanding += 1;
        Ok(ticket)
    }

    /// Validates the run parameters and sends the start command.
    ///
    /// When `paths` is `None`, the dataset locations from the last successful
    /// upload are used. Nothing is sent if validation fails or the stream is
    /// not open.
    pub fn start_training(&mut self, epochs: i64, paths: Option<DatasetPaths>) -> SessionResult<RunParameters> {
        let paths = paths
            .or_else(|| self.staging.last_known_paths())
            .unwrap_or_else(|| DatasetPaths::new("", ""));

        let params = RunParameters::new(epochs, &paths).inspect_err(|e| {
            warn!(session_id = %self.id, error = %e, "Rejected start command");
        })?;

        self.stream.send(&params.to_command())?;
        info!(
            session_id = %self.id,
            epochs = params.epoch_count(),
            dataset_dir = %params.training_path(),
            validation_dir = %params.validation_path(),
            "Training started"
        );
        Ok(params)
    }

    /// Clears staged datasets, upload state and metrics in one step. The
    /// stream is left as it is.
    pub fn reset(&mut self) {
        self.staging.clear();
        self.upload.reset();
        self.metrics.reset();
        self.saved_model = None;
        info!(session_id = %self.id, stream = %self.stream.state(), "Session reset");
    }

    /// Waits for the next upload completion or transport event.
    ///
    /// Returns `None` once the transport has stopped reporting and no upload
    /// completion is outstanding; a later `submit_upload` makes events
    /// available again. Cancel safe.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let awaiting_upload = self.uploads_outstanding > 0;
        tokio::select! {
            Some(event) = self.uploads_rx.recv(), if awaiting_upload => {
                self.uploads_outstanding -= 1;
                Some(event)
            }
            Some(event) = self.transport_rx.recv() => Some(SessionEvent::Transport(event)),
            else => None,
        }
    }

    /// Applies one event to completion.
    pub fn handle_event(&mut self, event: SessionEvent) -> Option<Notification> {
        match event {
            SessionEvent::UploadCompleted { ticket, outcome } => {
                match self.upload.complete(ticket, outcome)? {
                    Ok(receipt) => {
                        self.staging.record_summary(receipt.clone());
                        Some(Notification::UploadSucceeded(receipt))
                    }
                    Err(failure) => Some(Notification::UploadFailed(failure)),
                }
            }
            SessionEvent::Transport(event) => {
                let update = self.stream.on_transport_event(event);
                self.handle_stream_update(update)
            }
        }
    }

    fn handle_stream_update(&mut self, update: StreamUpdate) -> Option<Notification> {
        match update {
            StreamUpdate::Ready => Some(Notification::StreamReady),
            StreamUpdate::Closed => Some(Notification::StreamClosed),
            StreamUpdate::Errored(reason) => Some(Notification::StreamErrored(reason)),
            StreamUpdate::Dropped(e) => Some(Notification::MessageDropped(e)),
            StreamUpdate::Ignored => None,
            StreamUpdate::Inbound(message) => self.dispatch(message),
        }
    }

    fn dispatch(&mut self, message: InboundMessage) -> Option<Notification> {
        match message {
            InboundMessage::EpochEnd(event) => {
                self.metrics.append(event);
                debug!(
                    session_id = %self.id,
                    epoch = event.epoch,
                    loss = event.training_loss,
                    val_loss = event.validation_loss,
                    "Recorded epoch"
                );
                Some(Notification::EpochRecorded(event))
            }
            InboundMessage::DatasetInfo(info) => Some(Notification::DatasetInfo(info)),
            InboundMessage::ModelSaved { model_path } => {
                info!(session_id = %self.id, model_path = %model_path, "Backend saved model");
                self.saved_model = Some(model_path.clone());
                Some(Notification::ModelSaved(model_path))
            }
            InboundMessage::Unrecognized(_) => None,
        }
    }

    /// Closes the stream. Safe to call more than once; dropping the
    /// orchestrator closes it as well.
    pub fn shutdown(&mut self) {
        if self.stream.close() {
            info!(session_id = %self.id, "Session shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CommandError, SessionError, StagingError, UploadError};
    use crate::stream::testing::RecordingTransport;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SUCCESS_BODY: &str = r#"{"dataset":"/srv/train","validation":"/srv/val",
        "dataset_info":{"train_dataset":{"g_count":6,"ng_count":4,"slide_count":10},
        "validation_dataset":{"val_g_count":3,"val_ng_count":2,"val_slide_count":5}}}"#;

    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UploadBackend for CountingBackend {
        async fn upload(&self, _request: crate::upload::UploadRequest) -> Result<UploadReply, UploadFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(UploadReply::new(200, SUCCESS_BODY))
        }
    }

    fn zip(name: &str) -> DatasetBlob {
        DatasetBlob::new(name, "application/zip", "PK")
    }

    fn epoch_end(epoch: u64) -> SessionEvent {
        SessionEvent::Transport(TransportEvent::Message(format!(
            r#"{{"status":"epoch_end","epoch":{epoch},"loss":0.5,"val_loss":0.6,"accuracy":0.7,"val_accuracy":0.65}}"#
        )))
    }

    fn orchestrator() -> (SessionOrchestrator, Arc<CountingBackend>, RecordingTransport) {
        let backend = Arc::new(CountingBackend::default());
        let transport = RecordingTransport::default();
        let orchestrator = SessionOrchestrator::start(backend.clone(), &transport, "ws://test/ws");
        (orchestrator, backend, transport)
    }

    #[tokio::test]
    async fn test_submit_with_one_slot_sends_nothing() {
        let (mut session, backend, _transport) = orchestrator();
        session.select_dataset(DatasetRole::Training, zip("train.zip")).unwrap();

        let err = session.submit_upload().unwrap_err();
        assert_eq!(err, SessionError::Upload(UploadError::MissingDataset));
        tokio::task::yield_now().await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.upload_state(), &UploadState::Idle);
    }

    #[tokio::test]
    async fn test_double_submit_issues_one_request() {
        let (mut session, backend, _transport) = orchestrator();
        session.select_dataset(DatasetRole::Training, zip("train.zip")).unwrap();
        session.select_dataset(DatasetRole::Validation, zip("val.zip")).unwrap();

        session.submit_upload().unwrap();
        assert_eq!(session.submit_upload().unwrap_err(), SessionError::Upload(UploadError::AlreadyInFlight));

        let event = session.next_event().await.unwrap();
        let notification = session.handle_event(event).unwrap();
        assert!(matches!(notification, Notification::UploadSucceeded(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.staging().summary().unwrap().training.item_count, 10);
    }

    #[tokio::test]
    async fn test_start_training_uses_uploaded_paths() {
        let (mut session, _backend, transport) = orchestrator();
        session.select_dataset(DatasetRole::Training, zip("train.zip")).unwrap();
        session.select_dataset(DatasetRole::Validation, zip("val.zip")).unwrap();
        session.submit_upload().unwrap();
        let event = session.next_event().await.unwrap();
        session.handle_event(event);

        assert_eq!(session.start_training(5, None).unwrap_err(), SessionError::Stream(StreamError::ChannelNotReady));
        assert!(transport.sent().is_empty());

        assert_eq!(session.handle_event(SessionEvent::Transport(TransportEvent::Opened)), Some(Notification::StreamReady));
        let params = session.start_training(5, None).unwrap();
        assert_eq!(params.training_path(), "/srv/train");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(json, serde_json::json!({"epochs": 5, "dataset_dir": "/srv/train", "validation_dir": "/srv/val"}));
    }

    #[tokio::test]
    async fn test_start_training_validation_sends_nothing() {
        let (mut session, _backend, transport) = orchestrator();
        session.handle_event(SessionEvent::Transport(TransportEvent::Opened));

        assert_eq!(
            session.start_training(0, Some(DatasetPaths::new("/a", "/b"))).unwrap_err(),
            SessionError::Command(CommandError::InvalidEpochCount(0))
        );
        assert_eq!(session.start_training(3, None).unwrap_err(), SessionError::Command(CommandError::MissingPath));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_between_epochs_is_dropped() {
        let (mut session, _backend, _transport) = orchestrator();
        session.handle_event(SessionEvent::Transport(TransportEvent::Opened));

        session.handle_event(epoch_end(0));
        let dropped = session.handle_event(SessionEvent::Transport(TransportEvent::Message(
            r#"{"status":"epoch_end","epoch":1,"loss":0.4}"#.to_string(),
        )));
        assert!(matches!(dropped, Some(Notification::MessageDropped(_))));
        session.handle_event(epoch_end(1));

        let epochs: Vec<u64> = session.metrics().snapshot().iter().map(|e| e.epoch).collect();
        assert_eq!(epochs, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_reset_clears_data_but_not_stream() {
        let (mut session, _backend, _transport) = orchestrator();
        session.handle_event(SessionEvent::Transport(TransportEvent::Opened));
        session.select_dataset(DatasetRole::Training, zip("train.zip")).unwrap();
        session.handle_event(epoch_end(0));
        session.handle_event(SessionEvent::Transport(TransportEvent::Message(
            r#"{"status":"model_saved","model_path":"/srv/model.h5"}"#.to_string(),
        )));
        assert_eq!(session.saved_model(), Some("/srv/model.h5"));

        session.reset();
        assert!(session.staging().current_slots().is_empty());
        assert_eq!(session.upload_state(), &UploadState::Idle);
        assert!(session.metrics().is_empty());
        assert!(session.saved_model().is_none());
        assert_eq!(session.stream_state(), &StreamConnection::Open);
    }

    #[tokio::test]
    async fn test_reset_during_upload_discards_late_answer() {
        let (mut session, _backend, _transport) = orchestrator();
        session.select_dataset(DatasetRole::Training, zip("train.zip")).unwrap();
        session.select_dataset(DatasetRole::Validation, zip("val.zip")).unwrap();
        session.submit_upload().unwrap();
        session.reset();

        let event = session.next_event().await.unwrap();
        assert_eq!(session.handle_event(event), None);
        assert_eq!(session.upload_state(), &UploadState::Idle);
        assert!(session.staging().summary().is_none());
    }

    #[tokio::test]
    async fn test_invalid_selection_reports_format() {
        let (mut session, _backend, _transport) = orchestrator();
        let err = session.select_dataset(DatasetRole::Training, DatasetBlob::new("a.csv", "text/csv", "")).unwrap_err();
        assert!(matches!(err, SessionError::Staging(StagingError::InvalidFormat { .. })));
    }

    #[tokio::test]
    async fn test_dataset_info_does_not_touch_summary_or_metrics() {
        let (mut session, _backend, _transport) = orchestrator();
        session.handle_event(SessionEvent::Transport(TransportEvent::Opened));
        let notification = session.handle_event(SessionEvent::Transport(TransportEvent::Message(
            r#"{"status":"dataset_info","g_count":1,"ng_count":1,"slide_count":2,"val_g_count":0,"val_ng_count":1,"val_slide_count":1}"#
                .to_string(),
        )));
        assert!(matches!(notification, Some(Notification::DatasetInfo(_))));
        assert!(session.staging().summary().is_none());
        assert!(session.metrics().is_empty());
    }

    #[tokio::test]
    async fn test_next_event_ends_when_nothing_can_arrive() {
        // The recording transport drops its event sender, so only uploads remain.
        let (mut session, _backend, _transport) = orchestrator();
        assert_eq!(session.next_event().await, None);

        session.select_dataset(DatasetRole::Training, zip("train.zip")).unwrap();
        session.select_dataset(DatasetRole::Validation, zip("val.zip")).unwrap();
        session.submit_upload().unwrap();
        session.reset();

        let event = session.next_event().await;
        assert!(matches!(event, Some(SessionEvent::UploadCompleted { .. })));
        assert_eq!(session.handle_event(event.unwrap()), None);
        assert_eq!(session.next_event().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (mut session, _backend, transport) = orchestrator();
        session.shutdown();
        session.shutdown();
        assert!(transport.released());
        assert_eq!(session.stream_state(), &StreamConnection::Closed);
    }
}
