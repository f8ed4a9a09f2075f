//! Dataset staging: at most one candidate archive per role.

use crate::command::DatasetPaths;
use crate::error::StagingError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Content types accepted as a dataset container.
pub const ACCEPTED_ARCHIVE_TYPES: &[&str] = &["application/zip", "application/x-zip-compressed"];

/// Which side of the run a dataset feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    Training,
    Validation,
}

impl DatasetRole {
    /// Name of the multipart part carrying this role's archive.
    #[must_use]
    pub const fn part_name(self) -> &'static str {
        match self {
            Self::Training => "dataset",
            Self::Validation => "validation",
        }
    }
}

impl std::fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Training => f.write_str("training"),
            Self::Validation => f.write_str("validation"),
        }
    }
}

impl std::str::FromStr for DatasetRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "training" | "train" | "dataset" => Ok(Self::Training),
            "validation" | "val" => Ok(Self::Validation),
            other => Err(format!("unknown dataset role: {other}")),
        }
    }
}

/// A file the user picked, before any format check.
#[derive(Debug, Clone)]
pub struct DatasetBlob {
    pub file_name: String,
    pub declared_format: String,
    pub payload: Bytes,
}

impl DatasetBlob {
    #[must_use]
    pub fn new(file_name: impl Into<String>, declared_format: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { file_name: file_name.into(), declared_format: declared_format.into(), payload: payload.into() }
    }
}

/// An accepted archive occupying one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSlot {
    pub role: DatasetRole,
    pub file_name: String,
    pub declared_format: String,
    pub payload: Bytes,
}

/// Per-role counts reported by the backend after an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub role: DatasetRole,
    pub positive_count: u64,
    pub negative_count: u64,
    pub item_count: u64,
}

/// What a successful upload produced: the backend-side locations of both
/// datasets and their summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub training_path: String,
    pub validation_path: String,
    pub training: DatasetSummary,
    pub validation: DatasetSummary,
}

impl UploadReceipt {
    #[must_use]
    pub fn paths(&self) -> DatasetPaths {
        DatasetPaths::new(self.training_path.clone(), self.validation_path.clone())
    }
}

/// Returns `true` if `declared` names an accepted archive container.
///
/// Comparison ignores case and MIME parameters (`application/zip; foo=bar`).
#[must_use]
pub fn is_accepted_archive(declared: &str) -> bool {
    let essence = declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    ACCEPTED_ARCHIVE_TYPES.contains(&essence.as_str())
}

/// Holds the staged archives and the last upload summary shown to the user.
#[derive(Debug, Default)]
pub struct DatasetStaging {
    training: Option<DatasetSlot>,
    validation: Option<DatasetSlot>,
    receipt: Option<UploadReceipt>,
}

impl DatasetStaging {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `blob` for `role`, replacing any previous slot.
    ///
    /// A rejected blob leaves the previous slot for that role in place.
    pub fn select(&mut self, role: DatasetRole, blob: DatasetBlob) -> Result<&DatasetSlot, StagingError> {
        if !is_accepted_archive(&blob.declared_format) {
            warn!(
                role = %role,
                file = %blob.file_name,
                declared = %blob.declared_format,
                "Rejected dataset selection"
            );
            return Err(StagingError::InvalidFormat { declared: blob.declared_format });
        }

        debug!(role = %role, file = %blob.file_name, bytes = blob.payload.len(), "Staged dataset");
        let slot = DatasetSlot {
            role,
            file_name: blob.file_name,
            declared_format: blob.declared_format,
            payload: blob.payload,
        };
        let entry = match role {
            DatasetRole::Training => &mut self.training,
            DatasetRole::Validation => &mut self.validation,
        };
        Ok(&*entry.insert(slot))
    }

    /// Drops both slots and the displayed summary.
    pub fn clear(&mut self) {
        self.training = None;
        self.validation = None;
        self.receipt = None;
    }

    /// The staged slots, training first.
    #[must_use]
    pub fn current_slots(&self) -> Vec<&DatasetSlot> {
        self.training.iter().chain(self.validation.iter()).collect()
    }

    #[must_use]
    pub fn slot(&self, role: DatasetRole) -> Option<&DatasetSlot> {
        match role {
            DatasetRole::Training => self.training.as_ref(),
            DatasetRole::Validation => self.validation.as_ref(),
        }
    }

    /// The summary of the last successful upload, if any.
    #[must_use]
    pub fn summary(&self) -> Option<&UploadReceipt> {
        self.receipt.as_ref()
    }

    /// Backend-side dataset locations from the last successful upload.
    #[must_use]
    pub fn last_known_paths(&self) -> Option<DatasetPaths> {
        self.receipt.as_ref().map(UploadReceipt::paths)
    }

    /// Keeps the receipt of a successful upload as the current summary.
    pub fn record_summary(&mut self, receipt: UploadReceipt) {
        self.receipt = Some(receipt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip(name: &str) -> DatasetBlob {
        DatasetBlob::new(name, "application/zip", Bytes::from_static(b"PK\x03\x04"))
    }

    #[test]
    fn test_accepts_both_zip_content_types() {
        assert!(is_accepted_archive("application/zip"));
        assert!(is_accepted_archive("application/x-zip-compressed"));
        assert!(is_accepted_archive("Application/ZIP; charset=binary"));
        assert!(!is_accepted_archive("text/plain"));
        assert!(!is_accepted_archive(""));
    }

    #[test]
    fn test_last_accepted_blob_wins_per_role() {
        let mut staging = DatasetStaging::new();
        staging.select(DatasetRole::Training, zip("a.zip")).unwrap();
        staging.select(DatasetRole::Training, zip("b.zip")).unwrap();
        staging.select(DatasetRole::Validation, zip("v.zip")).unwrap();

        let slots = staging.current_slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].file_name, "b.zip");
        assert_eq!(slots[1].file_name, "v.zip");
    }

    #[test]
    fn test_rejected_blob_keeps_previous_slot() {
        let mut staging = DatasetStaging::new();
        staging.select(DatasetRole::Validation, zip("good.zip")).unwrap();

        let err = staging
            .select(DatasetRole::Validation, DatasetBlob::new("notes.txt", "text/plain", "hello"))
            .unwrap_err();
        assert_eq!(err, StagingError::InvalidFormat { declared: "text/plain".to_string() });
        assert_eq!(staging.slot(DatasetRole::Validation).unwrap().file_name, "good.zip");
    }

    #[test]
    fn test_rejected_blob_on_empty_role_stays_empty() {
        let mut staging = DatasetStaging::new();
        assert!(staging.select(DatasetRole::Training, DatasetBlob::new("x.png", "image/png", "")).is_err());
        assert!(staging.current_slots().is_empty());
    }

    #[test]
    fn test_clear_removes_slots_and_summary() {
        let mut staging = DatasetStaging::new();
        staging.select(DatasetRole::Training, zip("a.zip")).unwrap();
        staging.record_summary(UploadReceipt {
            training_path: "/data/train".to_string(),
            validation_path: "/data/val".to_string(),
            training: DatasetSummary { role: DatasetRole::Training, positive_count: 1, negative_count: 2, item_count: 3 },
            validation: DatasetSummary { role: DatasetRole::Validation, positive_count: 0, negative_count: 0, item_count: 0 },
        });
        assert!(staging.last_known_paths().is_some());

        staging.clear();
        assert!(staging.current_slots().is_empty());
        assert!(staging.summary().is_none());
        assert!(staging.last_known_paths().is_none());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("training".parse::<DatasetRole>().unwrap(), DatasetRole::Training);
        assert_eq!("VAL".parse::<DatasetRole>().unwrap(), DatasetRole::Validation);
        assert!("test".parse::<DatasetRole>().is_err());
    }
}
