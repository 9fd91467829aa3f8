//! Changeset CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;

use super::output::Output;
use crate::domain::{Change, ChangeKind, Changeset, ChangesetId, ChangesetStatus};
use crate::staging::StagingArea;
use crate::storage::{ModelStore, Project};

#[derive(Subcommand)]
pub enum ChangesetCommands {
    /// Create a changeset against the current model
    Create {
        /// Changeset ID (lowercase letters, digits, '-' and '_')
        id: String,

        /// Human-readable name (defaults to the ID)
        #[arg(long, short)]
        name: Option<String>,

        /// Longer description
        #[arg(long, short)]
        description: Option<String>,

        /// Do not make the new changeset the active one
        #[arg(long)]
        no_activate: bool,
    },

    /// List all changesets
    List {
        /// Filter by status (staged, committed, discarded)
        #[arg(long, short)]
        status: Option<String>,
    },

    /// Show a changeset and its staged changes
    Show {
        /// Changeset ID (defaults to the active changeset)
        id: Option<String>,
    },

    /// Make a changeset the default target of other commands
    Activate {
        /// Changeset ID
        id: String,
    },
}

pub fn run(cmd: ChangesetCommands, output: &Output) -> Result<()> {
    match cmd {
        ChangesetCommands::Create {
            id,
            name,
            description,
            no_activate,
        } => create(output, &id, name, description, !no_activate),
        ChangesetCommands::List { status } => list(output, status.as_deref()),
        ChangesetCommands::Show { id } => show(output, id.as_deref()),
        ChangesetCommands::Activate { id } => activate(output, &id),
    }
}

/// Opens the staging area of the current project
pub(super) fn open_area(output: &Output) -> Result<StagingArea<ModelStore>> {
    let project = Project::open_current()?;
    output.verbose_ctx("project", &format!("Using project at: {}", project.root().display()));
    Ok(StagingArea::for_project(&project)?)
}

/// Resolves an explicit changeset ID, falling back to the active one
pub(super) fn target(
    area: &StagingArea<ModelStore>,
    explicit: Option<&str>,
) -> Result<ChangesetId> {
    match explicit {
        Some(id) => Ok(id.parse()?),
        None => area
            .active()?
            .context("No active changeset. Pass --changeset or run 'archstage changeset activate <id>'."),
    }
}

fn create(
    output: &Output,
    id: &str,
    name: Option<String>,
    description: Option<String>,
    activate: bool,
) -> Result<()> {
    let mut area = open_area(output)?;
    let id: ChangesetId = id.parse()?;

    let changeset = area.create_changeset(id, name, description)?;
    output.verbose_ctx(
        "create",
        &format!("Base snapshot: {}", changeset.meta.base_snapshot_hash),
    );
    if activate {
        area.activate(changeset.id())?;
    }

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": changeset.id(),
            "name": changeset.meta.name,
            "status": changeset.status(),
            "baseSnapshotHash": changeset.meta.base_snapshot_hash,
            "active": activate,
        }));
    } else {
        output.success(&format!("Created changeset: {} ({})", changeset.id(), changeset.meta.name));
    }

    Ok(())
}

fn list(output: &Output, status_filter: Option<&str>) -> Result<()> {
    let area = open_area(output)?;
    let active = area.active()?;

    let status: Option<ChangesetStatus> = status_filter
        .map(|s| match s {
            "staged" => Ok(ChangesetStatus::Staged),
            "committed" => Ok(ChangesetStatus::Committed),
            "discarded" => Ok(ChangesetStatus::Discarded),
            other => Err(anyhow::anyhow!("Invalid status: {}", other)),
        })
        .transpose()?;

    let list: Vec<_> = area
        .list()?
        .into_iter()
        .filter(|summary| status.map_or(true, |s| summary.status == s))
        .collect();

    if output.is_json() {
        output.data(&list);
    } else if list.is_empty() {
        println!("No changesets found.");
    } else {
        println!("  {:<24} {:<10} {:>7}  NAME", "ID", "STATUS", "CHANGES");
        println!("{}", "-".repeat(70));
        for summary in list {
            let marker = if active.as_ref() == Some(&summary.id) { "*" } else { " " };
            println!(
                "{} {:<24} {:<10} {:>7}  {}",
                marker, summary.id, summary.status, summary.change_count, summary.name
            );
        }
    }

    Ok(())
}

fn show(output: &Output, id: Option<&str>) -> Result<()> {
    let area = open_area(output)?;
    let id = target(&area, id)?;
    let changeset = area.changeset(&id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "meta": changeset.meta,
            "changes": changeset.changes(),
        }));
    } else {
        print_changeset(&changeset);
    }

    Ok(())
}

fn print_changeset(changeset: &Changeset) {
    let meta = &changeset.meta;
    println!("Changeset: {} ({})", meta.id, meta.name);
    println!("Status: {}", meta.status);
    if let Some(description) = &meta.description {
        println!("Description: {}", description);
    }
    println!("Created: {}", meta.created_at.format("%Y-%m-%d %H:%M"));
    println!("Modified: {}", meta.modified_at.format("%Y-%m-%d %H:%M"));
    println!("Base snapshot: {}", meta.base_snapshot_hash);

    if changeset.changes().is_empty() {
        println!("\nNo staged changes.");
        return;
    }

    println!("\nChanges ({}):", changeset.changes().len());
    for change in changeset.changes() {
        println!(
            "  {:>4}  {:<7} {}{}",
            change.sequence_number,
            change.kind.label(),
            change.element_id,
            detail(change)
        );
    }
}

fn detail(change: &Change) -> String {
    match &change.kind {
        ChangeKind::Add { after } => format!("  \"{}\"", after.name),
        ChangeKind::Update { after, .. } => {
            let mut parts = Vec::new();
            if let Some(name) = &after.name {
                parts.push(format!("name=\"{}\"", name));
            }
            parts.extend(after.properties.keys().map(|k| format!("{}=...", k)));
            parts.extend(after.remove_properties.iter().map(|k| format!("-{}", k)));
            if parts.is_empty() {
                String::new()
            } else {
                format!("  {}", parts.join(" "))
            }
        }
        ChangeKind::Delete { .. } => String::new(),
    }
}

fn activate(output: &Output, id: &str) -> Result<()> {
    let area = open_area(output)?;
    let id: ChangesetId = id.parse()?;
    area.activate(&id)?;

    output.success(&format!("Active changeset: {}", id));
    Ok(())
}
