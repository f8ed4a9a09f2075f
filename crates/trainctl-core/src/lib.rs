//! trainctl core
//!
//! Client-side session layer for a remote training job:
//! - Staging the training and validation archives (`DatasetStaging`)
//! - The one-shot upload exchange (`UploadSession`)
//! - The long-lived training stream (`StreamingSession`)
//! - The live metrics series (`MetricsSeriesStore`)
//! - Composing them into one session (`SessionOrchestrator`)
//!
//! Concrete HTTP and WebSocket transports live in `trainctl-transport`.

pub mod command;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod protocol;
pub mod stream;
pub mod upload;

pub use command::{DatasetPaths, RunParameters, StartTrainingCommand};
pub use config::{ClientConfig, ConfigError, DEFAULT_STREAM_URL, DEFAULT_UPLOAD_URL};
pub use dataset::{
    ACCEPTED_ARCHIVE_TYPES, DatasetBlob, DatasetRole, DatasetSlot, DatasetStaging, DatasetSummary, UploadReceipt,
};
pub use error::{CommandError, SessionError, SessionResult, StagingError, StreamError, UploadError, UploadFailure};
pub use metrics::{ChartSeries, EpochEvent, MetricKind, MetricsReader, MetricsSeriesStore};
pub use orchestrator::{Notification, SessionEvent, SessionOrchestrator};
pub use protocol::{InboundMessage, StreamDatasetInfo, decode_message};
pub use stream::{StreamConnection, StreamTransport, StreamUpdate, StreamingSession, TransportEvent, TransportHandle};
pub use upload::{
    ArchivePart, UploadBackend, UploadReply, UploadRequest, UploadSession, UploadState, UploadTicket,
    decode_upload_reply,
};
