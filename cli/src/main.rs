//! Accord CLI - drives the protocol lifecycle engine from the command line.
//!
//! # Architecture
//!
//! ```text
//! main() -> Cli::parse() -> load state -> run command -> save state (mutations only)
//! ```
//!
//! Every command loads the state document, runs against an in-memory
//! coordinator, and writes the document back when the command changed it.
//! Results go to stdout as JSON (or as the text diagram for `evolution`).

mod commands;

use anyhow::Result;
use clap::Parser;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use accord_engine::AccordConfig;

use crate::commands::Cli;

const LOG_FILE_NAME: &str = "accord.log";

/// Log file the subscriber writes to.
struct LogSink {
    path: PathBuf,
    file: File,
}

/// Open the first usable log file. Each rejected candidate adds one reason.
fn open_log(candidates: impl IntoIterator<Item = PathBuf>) -> (Option<LogSink>, Vec<String>) {
    let mut reasons = Vec::new();
    let sink = candidates.into_iter().find_map(|path| {
        let opened = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&path));
        match opened {
            Ok(file) => Some(LogSink { path, file }),
            Err(err) => {
                reasons.push(format!("Cannot log to {}: {err}", path.display()));
                None
            }
        }
    });
    (sink, reasons)
}

/// `~/.accord/logs/accord.log`, then `./.accord/logs/accord.log`.
fn log_candidates() -> Vec<PathBuf> {
    let home_logs = AccordConfig::path()
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join("logs"));
    home_logs
        .into_iter()
        .chain([Path::new(".accord").join("logs")])
        .map(|dir| dir.join(LOG_FILE_NAME))
        .collect()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (sink, reasons) = open_log(log_candidates());
    let path = sink.as_ref().map(|sink| sink.path.clone());
    // stdout carries JSON results, so without a file there is no output layer.
    let file_layer = sink.map(|sink| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(sink.file))
    });
    tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter)
        .init();

    if let Some(path) = path {
        tracing::info!(path = %path.display(), "Logging initialized");
    }
    for reason in reasons {
        tracing::warn!("{reason}");
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match AccordConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("warning: {err}; using defaults");
            AccordConfig::default()
        }
    };
    commands::execute(cli, &config)
}
