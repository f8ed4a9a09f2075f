//! Reading dataset archives from disk.

use anyhow::{Context, Result};
use std::path::Path;
use trainctl_core::{DatasetBlob, DatasetRole, SessionOrchestrator};

/// Reads `path` into a blob whose declared format is guessed from the extension.
pub fn load_archive(path: &Path) -> Result<DatasetBlob> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let payload = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let declared = mime_guess::from_path(path).first_or_octet_stream();

    Ok(DatasetBlob::new(file_name, declared.essence_str(), payload))
}

/// Loads `path` and stages it in `session` for `role`.
pub fn select(session: &mut SessionOrchestrator, role: DatasetRole, path: &Path) -> Result<()> {
    let blob = load_archive(path)?;
    session
        .select_dataset(role, blob)
        .with_context(|| format!("Cannot use {} as the {} dataset", path.display(), role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zip_extension_declares_zip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("train.zip");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let blob = load_archive(&path).unwrap();
        assert_eq!(blob.file_name, "train.zip");
        assert_eq!(blob.declared_format, "application/zip");
        assert_eq!(blob.payload.len(), 4);
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dataset.bin");
        std::fs::write(&path, b"\0").unwrap();

        assert_eq!(load_archive(&path).unwrap().declared_format, "application/octet-stream");
    }

    #[test]
    fn test_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_archive(&temp_dir.path().join("absent.zip")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
