//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{changeset, commit, element, review, stage};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "archstage")]
#[command(author, version, about = "Staged, drift-aware changesets for layered architecture models")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new archstage project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Inspect the committed model
    #[command(subcommand)]
    Element(element::ElementCommands),

    /// Manage changesets
    #[command(subcommand)]
    Changeset(changeset::ChangesetCommands),

    /// Stage an edit into a changeset
    #[command(subcommand)]
    Stage(stage::StageCommands),

    /// Remove a staged change by sequence number
    Unstage {
        /// Sequence number of the change
        sequence: u64,

        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Show the model as it would look after committing
    Preview {
        /// Only show elements of this layer
        #[arg(long, short)]
        layer: Option<String>,

        /// Only show elements the changeset touches
        #[arg(long)]
        touched: bool,

        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Report model changes since the changeset was created
    Drift {
        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Validate the projected model
    Validate {
        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Apply a changeset to the committed model
    Commit {
        /// Commit despite overlapping drift or validation errors
        #[arg(long)]
        force: bool,

        /// Refuse to commit when drift overlaps staged elements
        #[arg(long)]
        strict: bool,

        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Drop a changeset without touching the model
    Discard {
        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },
}

/// Installs the tracing subscriber on stderr
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "archstage=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Ignore a second install (only possible when run() is called twice in-process)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load()?.global.default_format.into(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("archstage starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created .archstage directory at: {}", project.state_dir().display()),
            );
            output.success(&format!(
                "Initialized archstage project at {}",
                project.root().display()
            ));
        }

        Commands::Element(cmd) => element::run(cmd, &output)?,
        Commands::Changeset(cmd) => changeset::run(cmd, &output)?,
        Commands::Stage(cmd) => stage::run(cmd, &output)?,

        Commands::Unstage { sequence, changeset } => {
            stage::unstage(&output, changeset.as_deref(), sequence)?
        }

        Commands::Preview { layer, touched, changeset } => {
            output.verbose_ctx(
                "preview",
                &format!("layer filter: {:?}, touched only: {}", layer, touched),
            );
            review::preview(&output, changeset.as_deref(), layer.as_deref(), touched)?
        }
        Commands::Drift { changeset } => review::drift(&output, changeset.as_deref())?,
        Commands::Validate { changeset } => review::validate(&output, changeset.as_deref())?,

        Commands::Commit { force, strict, changeset } => {
            commit::commit(&output, changeset.as_deref(), force, strict)?
        }
        Commands::Discard { changeset } => commit::discard(&output, changeset.as_deref())?,
    }

    output.verbose("Command completed successfully");
    Ok(())
}
