//! Inbound stream message decoding.
//!
//! Messages are JSON objects carrying a `status` discriminator. Decoding is a
//! dispatch table over that discriminator; unknown kinds and shapes without a
//! discriminator are passed back as [`InboundMessage::Unrecognized`] so the
//! caller can ignore them.

use crate::dataset::{DatasetRole, DatasetSummary};
use crate::error::StreamError;
use crate::metrics::EpochEvent;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub const STATUS_EPOCH_END: &str = "epoch_end";
pub const STATUS_DATASET_INFO: &str = "dataset_info";
pub const STATUS_MODEL_SAVED: &str = "model_saved";

/// Dataset counts the backend reports once training has loaded both datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDatasetInfo {
    pub training: DatasetSummary,
    pub validation: DatasetSummary,
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    EpochEnd(EpochEvent),
    DatasetInfo(StreamDatasetInfo),
    ModelSaved { model_path: String },
    /// Well-formed JSON this client does not act on. Holds the discriminator, if any.
    Unrecognized(Option<String>),
}

#[derive(Deserialize)]
struct EpochEndPayload {
    epoch: u64,
    loss: f64,
    val_loss: f64,
    accuracy: f64,
    val_accuracy: f64,
}

impl TryFrom<EpochEndPayload> for EpochEvent {
    type Error = StreamError;

    fn try_from(p: EpochEndPayload) -> Result<Self, Self::Error> {
        let values = [p.loss, p.val_loss, p.accuracy, p.val_accuracy];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(StreamError::DecodeError(format!("epoch {} carries a non-finite metric", p.epoch)));
        }
        Ok(Self {
            epoch: p.epoch,
            training_loss: p.loss,
            validation_loss: p.val_loss,
            training_accuracy: p.accuracy,
            validation_accuracy: p.val_accuracy,
        })
    }
}

#[derive(Deserialize)]
struct DatasetInfoPayload {
    g_count: u64,
    ng_count: u64,
    slide_count: u64,
    val_g_count: u64,
    val_ng_count: u64,
    val_slide_count: u64,
}

impl From<DatasetInfoPayload> for StreamDatasetInfo {
    fn from(p: DatasetInfoPayload) -> Self {
        Self {
            training: DatasetSummary {
                role: DatasetRole::Training,
                positive_count: p.g_count,
                negative_count: p.ng_count,
                item_count: p.slide_count,
            },
            validation: DatasetSummary {
                role: DatasetRole::Validation,
                positive_count: p.val_g_count,
                negative_count: p.val_ng_count,
                item_count: p.val_slide_count,
            },
        }
    }
}

#[derive(Deserialize)]
struct ModelSavedPayload {
    model_path: String,
}

fn payload<T: DeserializeOwned>(status: &str, value: Value) -> Result<T, StreamError> {
    serde_json::from_value(value).map_err(|e| StreamError::DecodeError(format!("{status}: {e}")))
}

/// Decodes one raw text frame.
///
/// Fails with `DecodeError` when the frame is not JSON, or when a recognized
/// kind is missing a required field. A failed decode never yields a partial
/// message.
pub fn decode_message(raw: &str) -> Result<InboundMessage, StreamError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| StreamError::DecodeError(e.to_string()))?;

    let Some(status) = value.get("status").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(InboundMessage::Unrecognized(None));
    };

    match status.as_str() {
        STATUS_EPOCH_END => {
            let event = EpochEvent::try_from(payload::<EpochEndPayload>(&status, value)?)?;
            Ok(InboundMessage::EpochEnd(event))
        }
        STATUS_DATASET_INFO => {
            let info = payload::<DatasetInfoPayload>(&status, value)?;
            Ok(InboundMessage::DatasetInfo(info.into()))
        }
        STATUS_MODEL_SAVED => {
            let saved = payload::<ModelSavedPayload>(&status, value)?;
            Ok(InboundMessage::ModelSaved { model_path: saved.model_path })
        }
        _ => Ok(InboundMessage::Unrecognized(Some(status))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_epoch_end() {
        let raw = r#"{"status":"epoch_end","epoch":4,"loss":0.25,"val_loss":0.31,"accuracy":0.9,"val_accuracy":0.87}"#;
        let InboundMessage::EpochEnd(event) = decode_message(raw).unwrap() else {
            panic!("expected epoch_end");
        };
        assert_eq!(event.epoch, 4);
        assert_eq!(event.validation_loss, 0.31);
        assert_eq!(event.label(), "Epoch 5");
    }

    #[test]
    fn test_integer_metrics_are_accepted() {
        let raw = r#"{"status":"epoch_end","epoch":0,"loss":1,"val_loss":1,"accuracy":0,"val_accuracy":0}"#;
        assert!(matches!(decode_message(raw), Ok(InboundMessage::EpochEnd(_))));
    }

    #[test]
    fn test_epoch_end_with_missing_or_bad_field_is_rejected() {
        let missing = r#"{"status":"epoch_end","epoch":1,"loss":0.2,"val_loss":0.3,"accuracy":0.8}"#;
        let text = r#"{"status":"epoch_end","epoch":1,"loss":"0.2","val_loss":0.3,"accuracy":0.8,"val_accuracy":0.7}"#;
        let negative = r#"{"status":"epoch_end","epoch":-1,"loss":0.2,"val_loss":0.3,"accuracy":0.8,"val_accuracy":0.7}"#;
        for raw in [missing, text, negative] {
            assert!(matches!(decode_message(raw), Err(StreamError::DecodeError(_))), "{raw}");
        }
    }

    #[test]
    fn test_not_json_is_decode_error() {
        assert!(matches!(decode_message("epoch 3 done"), Err(StreamError::DecodeError(_))));
    }

    #[test]
    fn test_unknown_shapes_are_unrecognized() {
        assert_eq!(
            decode_message(r#"{"status":"warmup","step":3}"#).unwrap(),
            InboundMessage::Unrecognized(Some("warmup".to_string()))
        );
        assert_eq!(decode_message(r#"{"epoch":1,"loss":0.2}"#).unwrap(), InboundMessage::Unrecognized(None));
        assert_eq!(decode_message("[1,2,3]").unwrap(), InboundMessage::Unrecognized(None));
    }

    #[test]
    fn test_decodes_dataset_info_and_model_saved() {
        let info = r#"{"status":"dataset_info","g_count":10,"ng_count":5,"slide_count":15,
                      "val_g_count":2,"val_ng_count":1,"val_slide_count":3}"#;
        let InboundMessage::DatasetInfo(info) = decode_message(info).unwrap() else {
            panic!("expected dataset_info");
        };
        assert_eq!(info.training.item_count, 15);
        assert_eq!(info.validation.negative_count, 1);

        let saved = r#"{"status":"model_saved","model_path":"/srv/model/20240101_model.h5"}"#;
        assert_eq!(
            decode_message(saved).unwrap(),
            InboundMessage::ModelSaved { model_path: "/srv/model/20240101_model.h5".to_string() }
        );
    }
}
