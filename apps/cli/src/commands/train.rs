//! Train command implementation.

use super::archive;
use crate::render;
use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use trainctl_core::{ClientConfig, DatasetPaths, DatasetRole, Notification, RunParameters, SessionOrchestrator};
use trainctl_transport::{HttpUploadClient, WebSocketTransport};

/// Progress of one `train` invocation.
#[derive(Debug, Default)]
struct RunProgress {
    upload_pending: bool,
    stream_ready: bool,
    started: bool,
}

impl RunProgress {
    fn can_start(&self) -> bool {
        self.stream_ready && !self.upload_pending && !self.started
    }
}

/// Execute the train command.
///
/// With `archives`, both are uploaded first and the run uses the server-side
/// paths from that upload unless `dirs` names others. The command is sent as
/// soon as the stream is open and the upload (if any) succeeded.
pub async fn execute(
    config: &ClientConfig,
    epochs: i64,
    archives: Option<(PathBuf, PathBuf)>,
    dirs: Option<(String, String)>,
) -> Result<()> {
    let dirs = dirs.map(|(training, validation)| DatasetPaths::new(training, validation));

    // Reject bad input before connecting or uploading. Paths from an upload
    // are only known later and get checked when the command is built.
    RunParameters::check_epochs(epochs).context("Cannot start training")?;
    if archives.is_none() || dirs.is_some() {
        RunParameters::new(epochs, dirs.as_ref().unwrap_or(&DatasetPaths::new("", "")))
            .context("Cannot start training")?;
    }

    let backend = Arc::new(HttpUploadClient::new(config.upload_url()));
    let mut session = SessionOrchestrator::start(backend, &WebSocketTransport::new(), config.stream_url());
    println!("Connecting to {}...", config.stream_url());

    let mut progress = RunProgress::default();
    if let Some((training, validation)) = archives {
        archive::select(&mut session, DatasetRole::Training, &training)?;
        archive::select(&mut session, DatasetRole::Validation, &validation)?;
        session.submit_upload()?;
        progress.upload_pending = true;
        println!("Uploading to {}...", config.upload_url());
    }

    let outcome = follow(&mut session, &mut progress, epochs, dirs).await;
    session.shutdown();

    if progress.started {
        println!();
        render::print_chart(&session.metrics().chart());
    }
    outcome
}

async fn follow(
    session: &mut SessionOrchestrator,
    progress: &mut RunProgress,
    epochs: i64,
    dirs: Option<DatasetPaths>,
) -> Result<()> {
    loop {
        let event = tokio::select! {
            event = session.next_event() => event,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "Interrupted".yellow());
                return Ok(());
            }
        };
        let Some(event) = event else {
            return Ok(());
        };
        let Some(notification) = session.handle_event(event) else {
            continue;
        };
        render::print_notification(&notification);

        match notification {
            Notification::StreamReady => progress.stream_ready = true,
            Notification::UploadSucceeded(_) => progress.upload_pending = false,
            Notification::UploadFailed(failure) => return Err(anyhow!(failure).context("Upload failed")),
            Notification::StreamErrored(reason) => return Err(anyhow!("Training stream error: {}", reason)),
            Notification::StreamClosed if !progress.started => {
                return Err(anyhow!("Training stream closed before training started"));
            }
            Notification::StreamClosed | Notification::ModelSaved(_) => return Ok(()),
            Notification::EpochRecorded(_) | Notification::MessageDropped(_) | Notification::DatasetInfo(_) => {}
        }

        if progress.can_start() {
            let params = session.start_training(epochs, dirs.clone()).context("Cannot start training")?;
            progress.started = true;
            println!(
                "{} Training {} epoch(s) on {}",
                "▶".green(),
                params.epoch_count(),
                params.training_path().cyan()
            );
        }
    }
}
