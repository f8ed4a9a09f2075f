//! trainctl - command-line control surface for remote training jobs
//!
//! Uploads the training and validation archives, starts a run over the
//! training stream, and renders the per-epoch metrics as they arrive.

mod commands;
mod config;
mod render;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// trainctl - drive a remote model training job from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "trainctl",
    author,
    version,
    about = "Upload datasets, start training, and follow its metrics",
    long_about = "trainctl stages two zip archives, uploads them to the training server,\nstarts a run over the training stream, and renders loss and accuracy per epoch."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Upload endpoint (overrides TRAINCTL_UPLOAD_URL and config files)
    #[arg(long, global = true)]
    upload_url: Option<String>,

    /// Training stream endpoint (overrides TRAINCTL_STREAM_URL and config files)
    #[arg(long, global = true)]
    stream_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload the training and validation archives
    ///
    /// Both files must be zip archives. Prints the dataset summary the
    /// server returns.
    Upload {
        /// Training dataset archive
        training_zip: PathBuf,

        /// Validation dataset archive
        validation_zip: PathBuf,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a training run and follow its metrics
    ///
    /// Optionally uploads the archives first and uses the server-side paths
    /// from that upload. Runs until the model is saved, the stream ends, or
    /// Ctrl-C.
    Train {
        /// Number of epochs to train
        #[arg(short, long, allow_negative_numbers = true)]
        epochs: i64,

        /// Training archive to upload before starting
        #[arg(long, requires = "validation_zip")]
        training_zip: Option<PathBuf>,

        /// Validation archive to upload before starting
        #[arg(long, requires = "training_zip")]
        validation_zip: Option<PathBuf>,

        /// Server-side training dataset directory
        #[arg(long, requires = "validation_dir")]
        dataset_dir: Option<String>,

        /// Server-side validation dataset directory
        #[arg(long, requires = "dataset_dir")]
        validation_dir: Option<String>,
    },

    /// Interactive session
    ///
    /// Reads commands from stdin while upload results and stream events
    /// arrive. Type `help` for the command list.
    Session,

    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let client_config = config::load_config(config::FlagOverrides {
        upload_url: args.upload_url,
        stream_url: args.stream_url,
        log_level: args.log_level,
    });

    // Initialize tracing
    let level = match client_config.log_level.as_deref().unwrap_or("info") {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Upload { training_zip, validation_zip, json } => {
            commands::upload::execute(&client_config, &training_zip, &validation_zip, json).await?;
        }
        Command::Train { epochs, training_zip, validation_zip, dataset_dir, validation_dir } => {
            let archives = training_zip.zip(validation_zip);
            let dirs = dataset_dir.zip(validation_dir);
            commands::train::execute(&client_config, epochs, archives, dirs).await?;
        }
        Command::Session => {
            commands::session::execute(&client_config).await?;
        }
        Command::Config { json } => {
            commands::config::execute(&client_config, json)?;
        }
    }

    Ok(())
}
