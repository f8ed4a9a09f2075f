//! Terminal rendering for summaries, epochs, charts and session events.

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Color as ComfyColor, Table};
use trainctl_core::{
    ChartSeries, DatasetSummary, EpochEvent, MetricKind, Notification, SessionOrchestrator, StreamConnection,
    StreamDatasetInfo, UploadReceipt, UploadState,
};

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn summary_row(name: &str, path: Option<&str>, summary: &DatasetSummary) -> Vec<Cell> {
    vec![
        Cell::new(name).fg(ComfyColor::Cyan),
        Cell::new(path.unwrap_or("-")),
        Cell::new(summary.positive_count).set_alignment(CellAlignment::Right),
        Cell::new(summary.negative_count).set_alignment(CellAlignment::Right),
        Cell::new(summary.item_count).set_alignment(CellAlignment::Right),
    ]
}

fn counts_table(rows: [Vec<Cell>; 2]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Dataset", "Location", "G", "NG", "Slides"]);
    for row in rows {
        table.add_row(row);
    }
    table
}

/// Per-role counts of a successful upload.
pub fn summary_table(receipt: &UploadReceipt) -> Table {
    counts_table([
        summary_row("Training", Some(&receipt.training_path), &receipt.training),
        summary_row("Validation", Some(&receipt.validation_path), &receipt.validation),
    ])
}

pub fn dataset_info_table(info: &StreamDatasetInfo) -> Table {
    counts_table([summary_row("Training", None, &info.training), summary_row("Validation", None, &info.validation)])
}

pub fn print_summary(receipt: &UploadReceipt) {
    println!("{} Upload complete", "✓".green());
    println!("{}", summary_table(receipt));
}

pub fn epoch_line(event: &EpochEvent) -> String {
    format!(
        "{:<10} loss {:.4}  val_loss {:.4}  acc {:.4}  val_acc {:.4}",
        event.label(),
        event.training_loss,
        event.validation_loss,
        event.training_accuracy,
        event.validation_accuracy
    )
}

/// One block character per value, scaled between the series min and max.
pub fn sparkline(values: &[f64]) -> String {
    let (min, max) =
        values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = max - min;
    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                BARS[3]
            } else {
                BARS[(((v - min) / span) * 7.0).round().min(7.0) as usize]
            }
        })
        .collect()
}

/// Epoch-by-metric table of everything received so far.
pub fn chart_table(chart: &ChartSeries) -> Table {
    let mut table = Table::new();
    let mut header = vec!["Epoch"];
    header.extend(MetricKind::ALL.iter().map(|kind| kind.label()));
    table.set_header(header);

    for (row, label) in chart.labels.iter().enumerate() {
        let mut cells = vec![Cell::new(label)];
        cells.extend(
            MetricKind::ALL
                .iter()
                .map(|kind| Cell::new(format!("{:.4}", chart.series(*kind)[row])).set_alignment(CellAlignment::Right)),
        );
        table.add_row(cells);
    }
    table
}

pub fn print_chart(chart: &ChartSeries) {
    if chart.is_empty() {
        println!("  {}", "No epochs recorded yet".yellow());
        return;
    }
    println!("{}", chart_table(chart));
    for kind in MetricKind::ALL {
        println!("  {:<20} {}", kind.label().dimmed(), sparkline(chart.series(kind)).cyan());
    }
}

pub fn print_notification(notification: &Notification) {
    match notification {
        Notification::StreamReady => println!("{} Training stream connected", "✓".green()),
        Notification::StreamClosed => println!("{} Training stream closed", "•".yellow()),
        Notification::StreamErrored(reason) => {
            println!("{} Training stream error: {}", "✗".red(), reason.red());
        }
        Notification::UploadSucceeded(receipt) => print_summary(receipt),
        Notification::UploadFailed(failure) => println!("{} {}", "✗".red(), failure.to_string().red()),
        Notification::EpochRecorded(event) => println!("  {}", epoch_line(event)),
        Notification::MessageDropped(e) => println!("  {}", e.to_string().yellow()),
        Notification::DatasetInfo(info) => {
            println!("{}", "Training datasets loaded:".bold());
            println!("{}", dataset_info_table(info));
        }
        Notification::ModelSaved(path) => println!("{} Model saved to {}", "✓".green(), path.cyan()),
    }
}

fn stream_label(state: &StreamConnection) -> colored::ColoredString {
    match state {
        StreamConnection::Open => state.to_string().green(),
        StreamConnection::Connecting => state.to_string().yellow(),
        StreamConnection::Closed | StreamConnection::Errored(_) => state.to_string().red(),
    }
}

fn upload_label(state: &UploadState) -> colored::ColoredString {
    match state {
        UploadState::Idle => "idle".dimmed(),
        UploadState::InFlight => "in flight".yellow(),
        UploadState::Succeeded(_) => "succeeded".green(),
        UploadState::Failed(failure) => format!("failed ({})", failure).red(),
    }
}

pub fn print_status(session: &SessionOrchestrator) {
    println!("{}", "Session Status".bold().cyan());
    println!("  Session: {}", session.id().to_string().dimmed());
    println!("  Stream:  {}", stream_label(session.stream_state()));
    println!("  Upload:  {}", upload_label(session.upload_state()));

    let slots = session.staging().current_slots();
    if slots.is_empty() {
        println!("  Staged:  {}", "none".dimmed());
    }
    for slot in slots {
        println!("  Staged:  {} {}", format!("{}:", slot.role).bold(), slot.file_name);
    }

    if let Some(paths) = session.staging().last_known_paths() {
        println!("  Paths:   {} / {}", paths.training, paths.validation);
    }
    println!("  Epochs:  {}", session.metrics().len());
    if let Some(model) = session.saved_model() {
        println!("  Model:   {}", model.cyan());
    }
}
