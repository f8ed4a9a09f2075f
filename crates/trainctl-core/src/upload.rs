//! Upload session: the one-shot exchange that ships both archives to the
//! backend and receives the validation summary.
//!
//! The session is a pure state machine. [`UploadSession::begin`] checks the
//! preconditions and hands back the request to send; the caller delivers the
//! backend's answer to [`UploadSession::complete`] once it arrives.

use crate::dataset::{DatasetRole, DatasetSlot, DatasetSummary, UploadReceipt};
use crate::error::{UploadError, UploadFailure};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, error, warn};

/// Current state of the upload exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    InFlight,
    Succeeded(UploadReceipt),
    Failed(UploadFailure),
}

impl UploadState {
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

/// Identifies one submission so late answers can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadTicket(u64);

/// One named archive part of the multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePart {
    /// Multipart field name (`dataset` or `validation`).
    pub name: &'static str,
    pub file_name: String,
    pub content_type: String,
    pub payload: Bytes,
}

impl ArchivePart {
    fn from_slot(slot: &DatasetSlot) -> Self {
        Self {
            name: slot.role.part_name(),
            file_name: slot.file_name.clone(),
            content_type: slot.declared_format.clone(),
            payload: slot.payload.clone(),
        }
    }
}

/// The request bundling both archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub training: ArchivePart,
    pub validation: ArchivePart,
}

impl UploadRequest {
    /// Parts in wire order.
    #[must_use]
    pub fn parts(&self) -> [&ArchivePart; 2] {
        [&self.training, &self.validation]
    }
}

/// Raw answer of the backend: any status, undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub status: u16,
    pub body: Bytes,
}

impl UploadReply {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, body: body.into() }
    }
}

/// Performs the upload exchange.
///
/// Implementations return `Err(UploadFailure::NetworkError)` when no response
/// was received, and otherwise hand back the reply untouched; status and body
/// interpretation happens in [`decode_upload_reply`].
#[async_trait]
pub trait UploadBackend: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<UploadReply, UploadFailure>;
}

#[derive(Deserialize)]
struct UploadResponseBody {
    dataset: String,
    validation: String,
    dataset_info: DatasetInfoBody,
}

#[derive(Deserialize)]
struct DatasetInfoBody {
    train_dataset: TrainCounts,
    validation_dataset: ValidationCounts,
}

#[derive(Deserialize)]
struct TrainCounts {
    g_count: u64,
    ng_count: u64,
    slide_count: u64,
}

#[derive(Deserialize)]
struct ValidationCounts {
    val_g_count: u64,
    val_ng_count: u64,
    val_slide_count: u64,
}

/// Interprets a backend reply.
///
/// Non-2xx statuses become `ServerRejected`; a 2xx body that is not JSON or
/// lacks any required field becomes `MalformedResponse`.
pub fn decode_upload_reply(reply: &UploadReply) -> Result<UploadReceipt, UploadFailure> {
    if !(200..300).contains(&reply.status) {
        return Err(UploadFailure::ServerRejected(reply.status));
    }

    let body: UploadResponseBody = serde_json::from_slice(&reply.body)
        .map_err(|e| UploadFailure::MalformedResponse(e.to_string()))?;

    let train = body.dataset_info.train_dataset;
    let val = body.dataset_info.validation_dataset;
    Ok(UploadReceipt {
        training_path: body.dataset,
        validation_path: body.validation,
        training: DatasetSummary {
            role: DatasetRole::Training,
            positive_count: train.g_count,
            negative_count: train.ng_count,
            item_count: train.slide_count,
        },
        validation: DatasetSummary {
            role: DatasetRole::Validation,
            positive_count: val.val_g_count,
            negative_count: val.val_ng_count,
            item_count: val.val_slide_count,
        },
    })
}

/// State machine for the upload exchange.
#[derive(Debug, Default)]
pub struct UploadSession {
    state: UploadState,
    in_flight: Option<UploadTicket>,
    next_ticket: u64,
}

impl UploadSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Starts a submission.
    ///
    /// Fails with `AlreadyInFlight` while a previous submission is pending and
    /// with `MissingDataset` unless both slots are present. On success the
    /// state is `InFlight` and the returned request must be sent exactly once.
    pub fn begin(
        &mut self,
        training: Option<&DatasetSlot>,
        validation: Option<&DatasetSlot>,
    ) -> Result<(UploadTicket, UploadRequest), UploadError> {
        if self.in_flight.is_some() {
            warn!("Upload submitted while another is in flight");
            return Err(UploadError::AlreadyInFlight);
        }
        let (Some(training), Some(validation)) = (training, validation) else {
            warn!(
                training = training.is_some(),
                validation = validation.is_some(),
                "Upload submitted without both datasets"
            );
            return Err(UploadError::MissingDataset);
        };

        let ticket = UploadTicket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        self.state = UploadState::InFlight;

        debug!(
            ticket = ticket.0,
            training = %training.file_name,
            validation = %validation.file_name,
            "Upload in flight"
        );

        let request = UploadRequest {
            training: ArchivePart::from_slot(training),
            validation: ArchivePart::from_slot(validation),
        };
        Ok((ticket, request))
    }

    /// Applies the backend's answer for `ticket`.
    ///
    /// Returns `None` when `ticket` is not the pending submission (the session
    /// was reset in the meantime); the answer is then discarded.
    pub fn complete(
        &mut self,
        ticket: UploadTicket,
        outcome: Result<UploadReply, UploadFailure>,
    ) -> Option<Result<UploadReceipt, UploadFailure>> {
        if self.in_flight != Some(ticket) {
            debug!(ticket = ticket.0, "Discarding stale upload completion");
            return None;
        }
        self.in_flight = None;

        let result = outcome.and_then(|reply| decode_upload_reply(&reply));
        match &result {
            Ok(receipt) => {
                debug!(
                    ticket = ticket.0,
                    training_items = receipt.training.item_count,
                    validation_items = receipt.validation.item_count,
                    "Upload succeeded"
                );
                self.state = UploadState::Succeeded(receipt.clone());
            }
            Err(failure) => {
                error!(ticket = ticket.0, error = %failure, "Upload failed");
                self.state = UploadState::Failed(failure.clone());
            }
        }
        Some(result)
    }

    /// Back to `Idle`. A pending submission's answer will be discarded.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.state = UploadState::Idle;
    }
}
