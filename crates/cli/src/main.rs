//! notekit command line.
//!
//! `notekit chat` opens the interactive chat. The other subcommands run a
//! single operation against the data directory and exit.

mod chat;
mod confirm;
mod render;
mod workspace;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use colored::Colorize;
use nk_core::init::{generate_notekit_structure, InitOptions};
use nk_core::logging::init_tracing;
use nk_core::store::DocumentStore;
use nk_protocol::config_models::ConfirmationMode;
use std::path::PathBuf;
use std::sync::Arc;

use crate::chat::ChatApp;
use crate::confirm::StdinConfirmer;
use crate::workspace::Workspace;

#[derive(Parser, Debug)]
#[command(name = "notekit", version, about = "Turn notes into versioned Markdown documents")]
struct Cli {
    /// Project root holding `.notekit/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log debug output and span timings to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create `.notekit/` and the data repository.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,

        /// Only write the architect agent.
        #[arg(long)]
        minimal: bool,
    },

    /// Integrate one note into a project document.
    Note {
        project: String,

        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Ask before creating new documents.
        #[arg(short, long)]
        interactive: bool,
    },

    /// Start the interactive chat (default).
    Chat,

    /// List the project documents.
    List,

    /// Print a project document.
    Read { project: String },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose).map_err(|e| eyre!(e))?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Init { force, minimal } => init(cli.root, force, minimal).await,
        Command::Note {
            project,
            text,
            interactive,
        } => note(&cli.root, &project, &text.join(" "), interactive).await,
        Command::Chat => {
            let workspace = Workspace::open(&cli.root).await?;
            ChatApp::new(&workspace).run().await
        }
        Command::List => list(&cli.root).await,
        Command::Read { project } => read(&cli.root, &project).await,
    }
}

async fn init(root: PathBuf, force: bool, minimal: bool) -> color_eyre::Result<()> {
    let data_dir = generate_notekit_structure(InitOptions {
        target_dir: root,
        force,
        minimal,
        init_repository: true,
    })
    .await
    .wrap_err("initialization failed")?;

    println!("{} notekit initialized", "✓".green());
    println!("  documents: {}", data_dir.display());
    Ok(())
}

async fn note(root: &std::path::Path, project: &str, text: &str, interactive: bool) -> color_eyre::Result<()> {
    let workspace = Workspace::open(root).await?;
    let mode = if interactive {
        ConfirmationMode::Interactive
    } else {
        workspace.config.global.confirmation
    };
    let engine = workspace
        .engine(workspace.settings())
        .with_confirmer(Arc::new(StdinConfirmer::new(&workspace.config.global.create_prefix)));

    let state = engine.run_with_mode(&format!("/{project} {text}"), mode).await;
    if let Some(error) = &state.error {
        return Err(eyre!("{}", error.detail()));
    }
    println!("{}", render::describe_run(&state));
    Ok(())
}

async fn list(root: &std::path::Path) -> color_eyre::Result<()> {
    let workspace = Workspace::open(root).await?;
    let state = workspace.engine(workspace.settings()).run("/list").await;
    if let Some(error) = state.error {
        return Err(eyre!(error));
    }

    if state.listing.is_empty() {
        println!("No projects yet.");
    }
    for path in &state.listing {
        println!("{}", render::project_name(path));
    }
    Ok(())
}

async fn read(root: &std::path::Path, project: &str) -> color_eyre::Result<()> {
    let workspace = Workspace::open(root).await?;
    let path = workspace.project_path(project)?;
    match workspace.store.read(&path).await? {
        Some(content) => {
            print!("{content}");
            Ok(())
        }
        None => Err(eyre!("Project {project} not found ({path})")),
    }
}
