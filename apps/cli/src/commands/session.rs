//! Interactive session command.
//!
//! Reads one command per line from stdin while upload completions and stream
//! events are applied as they arrive. Every input is handled to completion
//! before the next one.

use super::archive;
use crate::render;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use trainctl_core::{ClientConfig, DatasetPaths, DatasetRole, SessionOrchestrator};
use trainctl_transport::{HttpUploadClient, WebSocketTransport};

const HELP: &str = "\
Commands:
  select training|validation <path>   Stage a zip archive
  upload                              Upload both staged archives
  start <epochs> [dataset_dir validation_dir]
                                      Start training (defaults to uploaded paths)
  reset                               Clear datasets, upload state and metrics
  status                              Show session state
  chart                               Show the metrics received so far
  help                                Show this list
  quit                                Close the stream and exit";

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionInput {
    Select { role: DatasetRole, path: PathBuf },
    Upload,
    Start { epochs: i64, paths: Option<DatasetPaths> },
    Reset,
    Status,
    Chart,
    Help,
    Quit,
    Empty,
}

fn parse_input(line: &str) -> Result<SessionInput, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&command, rest)) = words.split_first() else {
        return Ok(SessionInput::Empty);
    };

    match (command.to_ascii_lowercase().as_str(), rest) {
        ("select", [role, path @ ..]) if !path.is_empty() => {
            Ok(SessionInput::Select { role: role.parse()?, path: PathBuf::from(path.join(" ")) })
        }
        ("select", _) => Err("usage: select training|validation <path>".to_string()),
        ("upload", []) => Ok(SessionInput::Upload),
        ("start", [epochs]) => Ok(SessionInput::Start { epochs: parse_epochs(epochs)?, paths: None }),
        ("start", [epochs, training, validation]) => Ok(SessionInput::Start {
            epochs: parse_epochs(epochs)?,
            paths: Some(DatasetPaths::new(*training, *validation)),
        }),
        ("start", _) => Err("usage: start <epochs> [dataset_dir validation_dir]".to_string()),
        ("reset", []) => Ok(SessionInput::Reset),
        ("status", []) => Ok(SessionInput::Status),
        ("chart", []) => Ok(SessionInput::Chart),
        ("help" | "?", []) => Ok(SessionInput::Help),
        ("quit" | "exit", []) => Ok(SessionInput::Quit),
        (other, _) => Err(format!("unknown command '{}' (type 'help')", other)),
    }
}

fn parse_epochs(raw: &str) -> Result<i64, String> {
    raw.parse().map_err(|_| format!("'{}' is not a number of epochs", raw))
}

/// Applies one input. Returns `false` when the session should end.
fn apply(session: &mut SessionOrchestrator, input: SessionInput) -> Result<bool> {
    match input {
        SessionInput::Select { role, path } => {
            archive::select(session, role, &path)?;
            println!("{} Staged {} dataset {}", "✓".green(), role, path.display());
        }
        SessionInput::Upload => {
            session.submit_upload()?;
            println!("Uploading...");
        }
        SessionInput::Start { epochs, paths } => {
            let params = session.start_training(epochs, paths)?;
            println!("{} Training {} epoch(s)", "▶".green(), params.epoch_count());
        }
        SessionInput::Reset => {
            session.reset();
            println!("{} Session reset", "✓".green());
        }
        SessionInput::Status => render::print_status(session),
        SessionInput::Chart => render::print_chart(&session.metrics().chart()),
        SessionInput::Help => println!("{}", HELP),
        SessionInput::Quit => return Ok(false),
        SessionInput::Empty => {}
    }
    Ok(true)
}

/// Execute the interactive session command.
pub async fn execute(config: &ClientConfig) -> Result<()> {
    let backend = Arc::new(HttpUploadClient::new(config.upload_url()));
    let mut session = SessionOrchestrator::start(backend, &WebSocketTransport::new(), config.stream_url());

    println!("{}", "trainctl session".bold().cyan());
    println!("  Upload: {}", config.upload_url().dimmed());
    println!("  Stream: {}", config.stream_url().dimmed());
    println!("  Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    // Cleared when the session has nothing left to report; any input may
    // submit an upload, so it is set again after each line.
    let mut events_open = true;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let keep_going = match parse_input(&line) {
                    Ok(input) => apply(&mut session, input).unwrap_or_else(|e| {
                        println!("{} {:#}", "✗".red(), e);
                        true
                    }),
                    Err(usage) => {
                        println!("{} {}", "✗".red(), usage);
                        true
                    }
                };
                if !keep_going {
                    break;
                }
                events_open = true;
            }
            event = session.next_event(), if events_open => {
                let Some(event) = event else {
                    events_open = false;
                    continue;
                };
                if let Some(notification) = session.handle_event(event) {
                    render::print_notification(&notification);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_keeps_spaces_in_path() {
        assert_eq!(
            parse_input("select training /data/my sets/train.zip").unwrap(),
            SessionInput::Select { role: DatasetRole::Training, path: PathBuf::from("/data/my sets/train.zip") }
        );
        assert_eq!(
            parse_input("  SELECT val v.zip ").unwrap(),
            SessionInput::Select { role: DatasetRole::Validation, path: PathBuf::from("v.zip") }
        );
    }

    #[test]
    fn test_parse_select_errors() {
        assert!(parse_input("select training").is_err());
        assert!(parse_input("select model m.zip").unwrap_err().contains("unknown dataset role"));
    }

    #[test]
    fn test_parse_start() {
        assert_eq!(parse_input("start 10").unwrap(), SessionInput::Start { epochs: 10, paths: None });
        assert_eq!(
            parse_input("start 3 /srv/train /srv/val").unwrap(),
            SessionInput::Start { epochs: 3, paths: Some(DatasetPaths::new("/srv/train", "/srv/val")) }
        );
        // Range checks belong to the session, not the parser.
        assert_eq!(parse_input("start -2").unwrap(), SessionInput::Start { epochs: -2, paths: None });
        assert!(parse_input("start ten").is_err());
        assert!(parse_input("start 1 /only-one").is_err());
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_input("").unwrap(), SessionInput::Empty);
        assert_eq!(parse_input("upload").unwrap(), SessionInput::Upload);
        assert_eq!(parse_input("reset").unwrap(), SessionInput::Reset);
        assert_eq!(parse_input("exit").unwrap(), SessionInput::Quit);
        assert!(parse_input("upload now").is_err());
        assert!(parse_input("fly").unwrap_err().contains("unknown command"));
    }
}
