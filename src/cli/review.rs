//! Read-only changeset commands: preview, drift, validate

use anyhow::Result;

use super::changeset::{open_area, target};
use super::element::print_elements;
use super::output::Output;
use crate::domain::Layer;
use crate::staging::{DriftReport, ProjectionFilter, ValidationIssue, ValidationReport};

pub fn preview(
    output: &Output,
    changeset: Option<&str>,
    layer: Option<&str>,
    touched: bool,
) -> Result<()> {
    let mut area = open_area(output)?;
    let id = target(&area, changeset)?;
    let projection = area.preview(&id)?;

    let mut filter = match layer {
        Some(layer) => ProjectionFilter::layer(layer.parse::<Layer>()?),
        None => ProjectionFilter::all(),
    };
    if touched {
        filter.touched_only = Some(projection.touched().clone());
    }

    if output.is_json() {
        let elements: Vec<_> = projection.view(&filter).collect();
        output.data(&serde_json::json!({
            "changeset": id,
            "baseSnapshotHash": projection.key().base_hash,
            "touched": projection.touched(),
            "elements": elements,
        }));
        return Ok(());
    }

    println!(
        "Preview of {} ({} element(s), {} touched)\n",
        id,
        projection.model().len(),
        projection.touched().len()
    );
    print_elements(projection.view(&filter));

    Ok(())
}

pub fn drift(output: &Output, changeset: Option<&str>) -> Result<()> {
    let area = open_area(output)?;
    let id = target(&area, changeset)?;
    let report = area.check_drift(&id)?;

    if output.is_json() {
        output.data(&report);
    } else {
        print_drift(&report);
    }

    Ok(())
}

pub(super) fn print_drift(report: &DriftReport) {
    if !report.has_drifted {
        println!("No drift: the model is unchanged since the changeset was created.");
        return;
    }

    println!("Model changed since the changeset was created:");
    for element in &report.changed_element_ids {
        let marker = if report.overlapping.contains(element) { "  (staged)" } else { "" };
        println!("  {}{}", element, marker);
    }
    if report.overlaps() {
        println!(
            "\n{} changed element(s) are also staged; committing will overwrite them.",
            report.overlapping.len()
        );
    }
}

pub fn validate(output: &Output, changeset: Option<&str>) -> Result<()> {
    let mut area = open_area(output)?;
    let id = target(&area, changeset)?;
    let report = area.validate(&id)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "valid": report.is_valid(),
            "errors": report.errors,
            "warnings": report.warnings,
        }));
    } else {
        print_validation(&report);
        if report.is_valid() {
            println!("Changeset {} is valid.", id);
        }
    }

    if !report.is_valid() {
        anyhow::bail!("Changeset '{}' has {} validation error(s)", id, report.errors.len());
    }
    Ok(())
}

pub(super) fn print_validation(report: &ValidationReport) {
    for issue in &report.errors {
        println!("error: {}", describe(issue));
    }
    for issue in &report.warnings {
        println!("warning: {}", describe(issue));
    }
}

fn describe(issue: &ValidationIssue) -> String {
    format!("[{}] {}", issue.rule, issue.message)
}
