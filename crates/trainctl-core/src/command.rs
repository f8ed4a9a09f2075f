//! Start-training commands and their validation.

use crate::error::CommandError;
use serde::{Deserialize, Serialize};

/// Backend-side directories holding the training and validation datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub training: String,
    pub validation: String,
}

impl DatasetPaths {
    #[must_use]
    pub fn new(training: impl Into<String>, validation: impl Into<String>) -> Self {
        Self { training: training.into(), validation: validation.into() }
    }
}

/// Validated parameters of a training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    epoch_count: u32,
    training_path: String,
    validation_path: String,
}

impl RunParameters {
    /// Validates raw user input.
    ///
    /// The epoch count is checked before the paths. Paths that are empty after
    /// trimming count as missing.
    pub fn new(epochs: i64, paths: &DatasetPaths) -> Result<Self, CommandError> {
        let epoch_count = Self::check_epochs(epochs)?;

        let training_path = paths.training.trim();
        let validation_path = paths.validation.trim();
        if training_path.is_empty() || validation_path.is_empty() {
            return Err(CommandError::MissingPath);
        }

        Ok(Self {
            epoch_count,
            training_path: training_path.to_string(),
            validation_path: validation_path.to_string(),
        })
    }

    /// Checks the epoch count alone, for callers that learn the paths later.
    pub fn check_epochs(epochs: i64) -> Result<u32, CommandError> {
        u32::try_from(epochs).ok().filter(|count| *count > 0).ok_or(CommandError::InvalidEpochCount(epochs))
    }

    #[must_use]
    pub fn epoch_count(&self) -> u32 {
        self.epoch_count
    }

    #[must_use]
    pub fn training_path(&self) -> &str {
        &self.training_path
    }

    #[must_use]
    pub fn validation_path(&self) -> &str {
        &self.validation_path
    }

    /// The wire command for these parameters.
    #[must_use]
    pub fn to_command(&self) -> StartTrainingCommand {
        StartTrainingCommand {
            epochs: self.epoch_count,
            dataset_dir: self.training_path.clone(),
            validation_dir: self.validation_path.clone(),
        }
    }
}

/// Outbound message that asks the backend to begin training.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTrainingCommand {
    pub epochs: u32,
    pub dataset_dir: String,
    pub validation_dir: String,
}

impl StartTrainingCommand {
    /// The JSON text frame sent on the stream.
    #[must_use]
    pub fn to_frame(&self) -> String {
        serde_json::json!({
            "epochs": self.epochs,
            "dataset_dir": self.dataset_dir,
            "validation_dir": self.validation_dir,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> DatasetPaths {
        DatasetPaths::new("/srv/train", "/srv/val")
    }

    #[test]
    fn test_rejects_non_positive_epochs() {
        assert_eq!(RunParameters::new(0, &paths()), Err(CommandError::InvalidEpochCount(0)));
        assert_eq!(RunParameters::new(-3, &paths()), Err(CommandError::InvalidEpochCount(-3)));
        assert_eq!(
            RunParameters::new(i64::from(u32::MAX) + 1, &paths()),
            Err(CommandError::InvalidEpochCount(i64::from(u32::MAX) + 1))
        );
    }

    #[test]
    fn test_check_epochs_alone() {
        assert_eq!(RunParameters::check_epochs(12), Ok(12));
        assert_eq!(RunParameters::check_epochs(0), Err(CommandError::InvalidEpochCount(0)));
        assert_eq!(RunParameters::check_epochs(-1), Err(CommandError::InvalidEpochCount(-1)));
    }

    #[test]
    fn test_epoch_count_checked_before_paths() {
        let empty = DatasetPaths::new("", "");
        assert_eq!(RunParameters::new(0, &empty), Err(CommandError::InvalidEpochCount(0)));
    }

    #[test]
    fn test_blank_paths_are_missing() {
        assert_eq!(RunParameters::new(5, &DatasetPaths::new("  ", "/srv/val")), Err(CommandError::MissingPath));
        assert_eq!(RunParameters::new(5, &DatasetPaths::new("/srv/train", "")), Err(CommandError::MissingPath));
    }

    #[test]
    fn test_command_wire_shape() {
        let params = RunParameters::new(5, &DatasetPaths::new(" /srv/train ", "/srv/val")).unwrap();
        let json = serde_json::to_value(params.to_command()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"epochs": 5, "dataset_dir": "/srv/train", "validation_dir": "/srv/val"})
        );
    }

    #[test]
    fn test_frame_matches_serde_shape() {
        let command = RunParameters::new(7, &paths()).unwrap().to_command();
        let frame = command.to_frame();
        let parsed: StartTrainingCommand = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed, command);
        assert_eq!(serde_json::from_str::<serde_json::Value>(&frame).unwrap(), serde_json::to_value(&command).unwrap());
    }
}
