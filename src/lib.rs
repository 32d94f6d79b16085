pub mod chooser;
pub mod cli;
pub mod config;
pub mod editor;
pub mod errors;
pub mod events;
pub mod form_cache;
pub mod layout;
pub mod models;
pub mod registry;
pub mod rich_text;
pub mod store;
pub mod toggle;
pub mod widget;

#[cfg(test)]
mod test_support;

use crate::cli::Cli;
use crate::errors::{AppError, AppResult};
use clap::Parser;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

pub use crate::config::EditorConfig;
pub use crate::editor::FrontPageEditor;
pub use crate::store::{HttpLayoutStore, LayoutStore};

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_deref())?;
    cli::execute(cli).await
}

/// JSON lines to a daily rolling file when a directory is given, otherwise
/// human-readable output on stderr. Filtered by `RUST_LOG`, default `info`.
pub fn init_tracing(log_dir: Option<&Path>) -> AppResult<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let Some(log_dir) = log_dir else {
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|error| AppError::Config(error.to_string()));
    };

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "frontpage-editor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| AppError::Config(error.to_string()))
}
