//! Stage and unstage CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;

use super::changeset::{open_area, target};
use super::output::Output;
use crate::domain::{kebab_case, Change, Edit, Element, ElementDelta, ElementId, Value};

#[derive(Subcommand)]
pub enum StageCommands {
    /// Stage a new element
    Add {
        /// Element ID (layer.type.name), or layer.type to derive the name segment from --name
        id: String,

        /// Element name
        #[arg(long, short)]
        name: String,

        /// Element description
        #[arg(long, short)]
        description: Option<String>,

        /// Property as key=value; the value is parsed as JSON, falling back to a string
        #[arg(long = "prop", short = 'p', value_name = "KEY=VALUE")]
        props: Vec<String>,

        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Stage an update to an element
    Update {
        /// Element ID (layer.type.name)
        id: String,

        /// New name
        #[arg(long, short)]
        name: Option<String>,

        /// New description
        #[arg(long, short)]
        description: Option<String>,

        /// Property as key=value; map values merge into existing maps
        #[arg(long = "prop", short = 'p', value_name = "KEY=VALUE")]
        props: Vec<String>,

        /// Property to remove
        #[arg(long = "unset", value_name = "KEY")]
        unset: Vec<String>,

        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },

    /// Stage the deletion of an element
    Delete {
        /// Element ID (layer.type.name)
        id: String,

        /// Changeset ID (defaults to the active changeset)
        #[arg(long, short)]
        changeset: Option<String>,
    },
}

pub fn run(cmd: StageCommands, output: &Output) -> Result<()> {
    match cmd {
        StageCommands::Add {
            id,
            name,
            description,
            props,
            changeset,
        } => {
            let mut element = Element::new(new_element_id(&id, &name)?, name);
            element.description = description;
            for prop in &props {
                let (key, value) = parse_prop(prop)?;
                element.properties.insert(key, value);
            }
            stage(output, changeset.as_deref(), Edit::Add(element))
        }

        StageCommands::Update {
            id,
            name,
            description,
            props,
            unset,
            changeset,
        } => {
            let mut delta = ElementDelta {
                name,
                description,
                remove_properties: unset,
                ..ElementDelta::default()
            };
            for prop in &props {
                let (key, value) = parse_prop(prop)?;
                delta.properties.insert(key, value);
            }
            if delta.is_empty() {
                anyhow::bail!("Nothing to update. Pass --name, --description, --prop or --unset.");
            }
            stage(output, changeset.as_deref(), Edit::Update(id.parse()?, delta))
        }

        StageCommands::Delete { id, changeset } => {
            let id: ElementId = id.parse()?;
            stage(output, changeset.as_deref(), Edit::Delete(id))
        }
    }
}

/// Parses a full element ID, or completes `layer.type` with the kebab-cased name
fn new_element_id(raw: &str, name: &str) -> Result<ElementId> {
    if raw.matches('.').count() != 1 {
        return Ok(raw.parse()?);
    }
    let slug = kebab_case(name)
        .with_context(|| format!("Cannot derive an ID from name '{}'", name))?;
    Ok(format!("{}.{}", raw, slug).parse()?)
}

/// Parses `key=value`, reading the value as JSON when it is valid JSON
fn parse_prop(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid property '{}': expected KEY=VALUE", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Invalid property '{}': empty key", raw);
    }

    let json = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    let value = Value::try_from(json)
        .map_err(|e| anyhow::anyhow!("Invalid property '{}': {}", key, e))?;
    Ok((key.to_string(), value))
}

fn stage(output: &Output, changeset: Option<&str>, edit: Edit) -> Result<()> {
    let mut area = open_area(output)?;
    let id = target(&area, changeset)?;
    output.verbose_ctx("stage", &format!("Staging into changeset: {}", id));

    let change = area.stage(&id, edit)?;
    report(output, "Staged", &change);
    Ok(())
}

pub fn unstage(output: &Output, changeset: Option<&str>, sequence: u64) -> Result<()> {
    let mut area = open_area(output)?;
    let id = target(&area, changeset)?;

    let change = area.unstage(&id, sequence)?;
    report(output, "Unstaged", &change);
    Ok(())
}

fn report(output: &Output, verb: &str, change: &Change) {
    if output.is_json() {
        output.data(change);
    } else {
        output.success(&format!(
            "{} #{}: {} {}",
            verb,
            change.sequence_number,
            change.kind.label(),
            change.element_id
        ));
    }
}
