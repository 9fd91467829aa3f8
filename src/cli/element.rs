//! Element CLI commands (committed model, read-only)

use anyhow::Result;
use clap::Subcommand;

use super::changeset::open_area;
use super::output::Output;
use crate::domain::{Element, ElementId, Layer, RelationshipRegistry};

#[derive(Subcommand)]
pub enum ElementCommands {
    /// List committed elements
    List {
        /// Only list elements of this layer
        #[arg(long, short)]
        layer: Option<String>,
    },

    /// Show a committed element and its references
    Show {
        /// Element ID (layer.type.name)
        id: String,
    },
}

pub fn run(cmd: ElementCommands, output: &Output) -> Result<()> {
    match cmd {
        ElementCommands::List { layer } => list(output, layer.as_deref()),
        ElementCommands::Show { id } => show(output, &id),
    }
}

fn list(output: &Output, layer: Option<&str>) -> Result<()> {
    let layer: Option<Layer> = layer.map(str::parse::<Layer>).transpose()?;
    let model = open_area(output)?.committed_model()?;

    let elements: Vec<Element> = match layer {
        Some(layer) => model.layer(layer).cloned().collect(),
        None => model.elements().cloned().collect(),
    };
    output.verbose_ctx("element", &format!("Read {} elements", elements.len()));

    if output.is_json() {
        output.data(&elements);
    } else {
        print_elements(&elements);
    }

    Ok(())
}

/// Prints an element table, or a notice when there is nothing to show
pub(super) fn print_elements<'a>(elements: impl IntoIterator<Item = &'a Element>) {
    let mut empty = true;
    for element in elements {
        if empty {
            println!("{:<48} NAME", "ID");
            println!("{}", "-".repeat(70));
            empty = false;
        }
        println!("{:<48} {}", element.id, element.name);
    }
    if empty {
        println!("No elements found.");
    }
}

fn show(output: &Output, id: &str) -> Result<()> {
    let id: ElementId = id.parse()?;
    let model = open_area(output)?.committed_model()?;

    let element = model
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Element not found: {}", id))?;

    let registry = RelationshipRegistry::from_model(&model);
    let references: Vec<&ElementId> = registry.references_from(&id).collect();
    let referenced_by: Vec<&ElementId> = registry.referenced_by(&id).collect();
    let dependents = registry.dependents(&id);

    if output.is_json() {
        output.data(&serde_json::json!({
            "element": element,
            "references": references,
            "referencedBy": referenced_by,
            "dependents": dependents,
        }));
        return Ok(());
    }

    println!("Element: {}", element.id);
    println!("Name: {}", element.name);
    println!("Layer: {}", element.layer);
    println!("Type: {}", element.element_type);
    if let Some(description) = &element.description {
        println!("Description: {}", description);
    }

    if !element.properties.is_empty() {
        println!("\nProperties:");
        for (key, value) in &element.properties {
            println!("  {}: {}", key, value);
        }
    }

    if !references.is_empty() {
        println!("\nReferences:");
        for target in references {
            let marker = if model.contains(target) { "" } else { " (missing)" };
            println!("  -> {}{}", target, marker);
        }
    }

    if !referenced_by.is_empty() {
        println!("\nReferenced by:");
        for source in &referenced_by {
            println!("  <- {}", source);
        }
    }

    if dependents.len() > referenced_by.len() {
        println!("\n{} element(s) depend on this one transitively", dependents.len());
    }

    Ok(())
}
