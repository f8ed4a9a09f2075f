//! Upload command implementation.

use super::archive::load_archive;
use crate::render;
use anyhow::{Context, Result, bail};
use std::path::Path;
use trainctl_core::{ClientConfig, DatasetRole, DatasetStaging, UploadBackend, UploadSession};
use trainctl_transport::HttpUploadClient;

/// Execute the upload command.
///
/// Stages both archives and performs one upload exchange; no training stream
/// is opened.
pub async fn execute(config: &ClientConfig, training: &Path, validation: &Path, json_output: bool) -> Result<()> {
    let mut staging = DatasetStaging::new();
    for (role, path) in [(DatasetRole::Training, training), (DatasetRole::Validation, validation)] {
        staging
            .select(role, load_archive(path)?)
            .with_context(|| format!("Cannot use {} as the {} dataset", path.display(), role))?;
    }

    let client = HttpUploadClient::new(config.upload_url());
    let mut upload = UploadSession::new();
    let (ticket, request) =
        upload.begin(staging.slot(DatasetRole::Training), staging.slot(DatasetRole::Validation))?;

    let json_output = json_output || config.wants_json();
    if !json_output {
        println!("Uploading to {}...", config.upload_url());
    }
    let outcome = client.upload(request).await;

    let Some(result) = upload.complete(ticket, outcome) else {
        bail!("Upload answer was discarded");
    };
    staging.record_summary(result.context("Upload failed")?);
    let Some(receipt) = staging.summary() else {
        bail!("Upload summary was not recorded");
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(receipt)?);
    } else {
        render::print_summary(receipt);
    }
    Ok(())
}
