//! Commit and discard CLI commands

use anyhow::Result;

use super::changeset::{open_area, target};
use super::output::Output;
use super::review::{print_drift, print_validation};
use crate::staging::{CommitOptions, StagingError};

pub fn commit(output: &Output, changeset: Option<&str>, force: bool, strict: bool) -> Result<()> {
    let mut area = open_area(output)?;
    let id = target(&area, changeset)?;

    let options = CommitOptions {
        force,
        strict: strict.then_some(true),
    };
    output.verbose_ctx("commit", &format!("Committing {} with {:?}", id, options));

    let report = match area.commit(&id, options) {
        Ok(report) => report,
        Err(StagingError::Validation { id, report }) if !output.is_json() => {
            print_validation(&report);
            anyhow::bail!(
                "Changeset '{}' fails validation with {} error(s); fix them or pass --force",
                id,
                report.errors.len()
            );
        }
        Err(err) => return Err(err.into()),
    };

    if output.is_json() {
        output.data(&report);
        return Ok(());
    }

    if report.drift.has_drifted {
        output.warn(&format!(
            "the model changed since {} was created ({} element(s))",
            id,
            report.drift.changed_element_ids.len()
        ));
        if output.is_verbose() {
            print_drift(&report.drift);
        }
    }
    if !report.validation.errors.is_empty() || !report.validation.warnings.is_empty() {
        print_validation(&report.validation);
    }

    let layers: Vec<String> = report.touched_layers.iter().map(ToString::to_string).collect();
    output.success(&format!(
        "Committed {}: {} change(s) across {}{}",
        id,
        report.applied,
        if layers.is_empty() { "no layers".to_string() } else { layers.join(", ") },
        if report.forced { " (forced)" } else { "" }
    ));

    Ok(())
}

pub fn discard(output: &Output, changeset: Option<&str>) -> Result<()> {
    let mut area = open_area(output)?;
    let id = target(&area, changeset)?;

    let changeset = area.discard(&id)?;

    if output.is_json() {
        output.data(&changeset.summary());
    } else {
        output.success(&format!(
            "Discarded {} ({} staged change(s) dropped)",
            id,
            changeset.changes().len()
        ));
    }

    Ok(())
}
