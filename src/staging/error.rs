//! Error taxonomy for staging operations

use std::collections::BTreeSet;

use thiserror::Error;

use super::validator::ValidationReport;
use crate::domain::{ChangesetError, ChangesetId, ChangesetStatus, ElementId};

/// Coarse error category, for callers that map failures to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidState,
    NotFound,
    DuplicateId,
    Conflict,
    Drift,
    Validation,
    Io,
}

/// Errors returned by the staging area
///
/// Every error is returned to the immediate caller; nothing is retried.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Cannot {operation} changeset '{id}': it is {status}")]
    InvalidState {
        id: ChangesetId,
        status: ChangesetStatus,
        operation: &'static str,
    },

    #[error("Changeset not found: {0}")]
    ChangesetNotFound(ChangesetId),

    #[error("Changeset '{id}' has no change #{sequence}")]
    ChangeNotFound { id: ChangesetId, sequence: u64 },

    #[error("Change #{sequence} targets an element that does not exist: {element}")]
    ElementNotFound { element: ElementId, sequence: u64 },

    #[error("Changeset already exists: {0}")]
    DuplicateId(ChangesetId),

    #[error("Change #{sequence} adds an element that already exists: {element}")]
    Conflict { element: ElementId, sequence: u64 },

    #[error(
        "Model changed since changeset '{id}' was created, affecting staged elements: {}",
        join_ids(.overlapping)
    )]
    Drift {
        id: ChangesetId,
        overlapping: BTreeSet<ElementId>,
    },

    #[error("Changeset '{id}' fails validation with {} error(s)", .report.errors.len())]
    Validation { id: ChangesetId, report: ValidationReport },

    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

fn join_ids(ids: &BTreeSet<ElementId>) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl StagingError {
    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StagingError::InvalidState { .. } => ErrorKind::InvalidState,
            StagingError::ChangesetNotFound(_)
            | StagingError::ChangeNotFound { .. }
            | StagingError::ElementNotFound { .. } => ErrorKind::NotFound,
            StagingError::DuplicateId(_) => ErrorKind::DuplicateId,
            StagingError::Conflict { .. } => ErrorKind::Conflict,
            StagingError::Drift { .. } => ErrorKind::Drift,
            StagingError::Validation { .. } => ErrorKind::Validation,
            StagingError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<ChangesetError> for StagingError {
    fn from(err: ChangesetError) -> Self {
        match err {
            ChangesetError::InvalidState {
                id,
                status,
                operation,
            } => StagingError::InvalidState {
                id,
                status,
                operation,
            },
            ChangesetError::ChangeNotFound { id, sequence } => {
                StagingError::ChangeNotFound { id, sequence }
            }
        }
    }
}
