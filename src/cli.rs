//! Headless driver: loads one page's editor state from the host and applies
//! a single command to it.

use crate::config::EditorConfig;
use crate::editor::FrontPageEditor;
use crate::events::NoticeReceiver;
use crate::models::NoticeKind;
use crate::store::HttpLayoutStore;
use crate::toggle::{StatusPhase, StatusToggle};
use crate::widget::{SubmitOutcome, WidgetController};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "frontpage-editor")]
#[command(about = "Edit a front page's row/column widget layout over the host's REST API")]
pub struct Cli {
    /// Editor configuration JSON, as the host injects it into the page
    #[arg(short, long)]
    pub config: PathBuf,

    /// Write JSON logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show whether the custom front page is enabled
    Status,
    /// Enable the custom front page
    Enable,
    /// Disable the custom front page
    Disable,
    /// List the widget types the host offers
    Widgets,
    /// Inspect or change sections
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },
    /// Inspect or change a single widget
    Widget {
        #[command(subcommand)]
        action: WidgetAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum LayoutAction {
    Show,
    AddRow,
    DeleteRow { row: usize },
    MoveRow { from: usize, to: usize },
}

#[derive(Subcommand, Debug)]
pub enum WidgetAction {
    /// Place a new widget in an empty slot and save its settings
    Add {
        row: usize,
        col: usize,
        widget_type: String,
        /// Settings form field, as name=value
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Save settings for an existing widget
    Update {
        row: usize,
        col: usize,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    Remove { row: usize, col: usize },
    /// Print the widget's settings form markup
    Form { row: usize, col: usize },
    Show { row: usize, col: usize },
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got {}", raw)),
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = EditorConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let store = HttpLayoutStore::new(&config.config)?;
    tracing::info!(base_url = store.base_url(), object_id = config.object_id, "connecting to host");

    let (mut editor, mut notices) = FrontPageEditor::new(config, Arc::new(store));
    editor.load().await?;

    let yes = cli.yes;
    let confirm = move |prompt: &str| yes || ask(prompt);
    let outcome = dispatch(&mut editor, cli.command, &confirm).await;

    editor.flush().await;
    let had_errors = report_notices(&mut notices);
    outcome?;
    if had_errors {
        bail!("one or more changes were not saved");
    }
    Ok(())
}

async fn dispatch(editor: &mut FrontPageEditor, command: Command, confirm: &dyn Fn(&str) -> bool) -> Result<()> {
    match command {
        Command::Status => {
            let toggle = loaded_toggle(editor)?;
            println!("{}", if toggle.is_enabled() { "enabled" } else { "disabled" });
        }
        Command::Enable => set_status(editor, true).await?,
        Command::Disable => set_status(editor, false).await?,
        Command::Widgets => {
            println!("{}", serde_json::to_string_pretty(editor.registry().available_widgets())?);
        }
        Command::Layout { action } => layout_command(editor, action, confirm)?,
        Command::Widget { action } => widget_command(editor, action, confirm).await?,
    }
    Ok(())
}

async fn set_status(editor: &FrontPageEditor, enabled: bool) -> Result<()> {
    loaded_toggle(editor)?.set_enabled(enabled).await?;
    println!("{}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

/// The toggle, unless it is hidden for this page or its status never loaded.
fn loaded_toggle(editor: &FrontPageEditor) -> Result<&StatusToggle> {
    let toggle = editor.toggle().context("status toggle is not shown for this page")?;
    if let StatusPhase::Failed(message) = toggle.phase() {
        bail!("{}", message);
    }
    Ok(toggle)
}

fn layout_command(editor: &mut FrontPageEditor, action: LayoutAction, confirm: &dyn Fn(&str) -> bool) -> Result<()> {
    let layout = editor.layout_mut();
    let changed = match action {
        LayoutAction::Show => {
            println!("{}", serde_json::to_string_pretty(layout.rows())?);
            return Ok(());
        }
        LayoutAction::AddRow => layout.add_row(),
        LayoutAction::DeleteRow { row } => layout.delete_row(row, &confirm),
        LayoutAction::MoveRow { from, to } => layout.reorder_rows(from, to),
    };
    if !changed {
        tracing::info!("layout unchanged");
        eprintln!("layout unchanged");
    }
    Ok(())
}

async fn widget_command(editor: &mut FrontPageEditor, action: WidgetAction, confirm: &dyn Fn(&str) -> bool) -> Result<()> {
    match action {
        WidgetAction::Add {
            row,
            col,
            widget_type,
            fields,
        } => {
            let widget = editor.place_widget(row, col, &widget_type)?;
            submit(editor, &widget, fields).await?;
            println!("{}", widget.widget_id());
        }
        WidgetAction::Update { row, col, fields } => {
            let widget = mounted(editor, row, col).await?;
            submit(editor, &widget, fields).await?;
        }
        WidgetAction::Remove { row, col } => {
            let widget = editor.widget(row, col)?;
            if let Err(error) = widget.mount().await {
                tracing::warn!(error = %error, "removing widget without details");
            }
            if !widget.request_delete(&confirm) {
                eprintln!("widget kept");
            }
        }
        WidgetAction::Form { row, col } => {
            let widget = mounted(editor, row, col).await?;
            widget.expand().await?;
            let markup = widget.snapshot().form_html.unwrap_or_default();
            widget.collapse();
            println!("{}", markup);
        }
        WidgetAction::Show { row, col } => {
            let widget = mounted(editor, row, col).await?;
            println!("{}", serde_json::to_string_pretty(&widget.snapshot())?);
        }
    }
    Ok(())
}

async fn mounted(editor: &mut FrontPageEditor, row: usize, col: usize) -> Result<Arc<WidgetController>> {
    let widget = editor.widget(row, col)?;
    widget.mount().await?;
    Ok(widget)
}

/// Submits settings, adding the hidden fields the host's form markup
/// would otherwise carry.
async fn submit(editor: &FrontPageEditor, widget: &WidgetController, mut fields: Vec<(String, String)>) -> Result<()> {
    let object = editor.object();
    let hidden = [
        ("object_type", object.object_type.clone()),
        ("object_id", object.object_id.to_string()),
        ("widget_type", widget.details().widget_type),
        ("widget_id", widget.widget_id().to_string()),
    ];
    for (name, value) in hidden {
        if !fields.iter().any(|(field, _)| field == name) {
            fields.push((name.to_string(), value));
        }
    }
    match widget.submit(fields).await {
        SubmitOutcome::Saved => Ok(()),
        SubmitOutcome::Rejected(message) => bail!("host rejected widget settings: {}", message),
        SubmitOutcome::Failed => bail!("widget settings were not saved"),
        SubmitOutcome::Ignored => bail!("widget {} cannot be saved in its current state", widget.widget_id()),
    }
}

fn ask(prompt: &str) -> bool {
    eprint!("{} [y/N] ", prompt);
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn report_notices(notices: &mut NoticeReceiver) -> bool {
    let mut had_errors = false;
    while let Ok(notice) = notices.try_recv() {
        match notice.kind {
            NoticeKind::Success => eprintln!("{}", notice.message),
            NoticeKind::Error => {
                had_errors = true;
                eprintln!("error: {}", notice.message);
            }
        }
    }
    had_errors
}
