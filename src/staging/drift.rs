//! Drift detection
//!
//! Drift is any difference between the committed model now and the model a
//! changeset was created against. A matching snapshot hash means no drift;
//! otherwise the per-element digests recorded at creation are diffed against
//! the current ones to name exactly which elements changed. Overlap is judged
//! per whole element: any change to an element a staged change targets
//! counts, whichever properties were touched.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::Serialize;

use super::snapshot::{compute_snapshot, BaseSnapshot};
use crate::domain::{Changeset, ElementId};
use crate::storage::BaseStore;

/// Outcome of a drift check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftReport {
    pub has_drifted: bool,
    pub base_hash: String,
    pub current_hash: String,
    /// Elements added, updated, or deleted since the changeset was created
    pub changed_element_ids: BTreeSet<ElementId>,
    /// The subset of `changed_element_ids` that staged changes target
    pub overlapping: BTreeSet<ElementId>,
}

impl DriftReport {
    /// Returns true if drift touches an element the changeset stages changes for
    pub fn overlaps(&self) -> bool {
        !self.overlapping.is_empty()
    }
}

/// Compares changesets against the current committed model
pub struct DriftDetector;

impl DriftDetector {
    /// Checks a changeset against the store's current content
    pub fn check<S: BaseStore + ?Sized>(changeset: &Changeset, store: &S) -> Result<DriftReport> {
        let current = compute_snapshot(store)?;
        Ok(Self::check_against(changeset, &current))
    }

    /// Checks a changeset against an already computed snapshot
    pub fn check_against(changeset: &Changeset, current: &BaseSnapshot) -> DriftReport {
        let base_hash = changeset.meta.base_snapshot_hash.clone();

        if base_hash == current.hash {
            return DriftReport {
                has_drifted: false,
                base_hash,
                current_hash: current.hash.clone(),
                changed_element_ids: BTreeSet::new(),
                overlapping: BTreeSet::new(),
            };
        }

        let recorded = &changeset.meta.base_manifest;
        let changed: BTreeSet<ElementId> = recorded
            .keys()
            .chain(current.manifest.keys())
            .filter(|id| recorded.get(*id) != current.manifest.get(*id))
            .cloned()
            .collect();

        let targets = changeset.targets();
        let overlapping = changed.intersection(&targets).cloned().collect();

        DriftReport {
            has_drifted: true,
            base_hash,
            current_hash: current.hash.clone(),
            changed_element_ids: changed,
            overlapping,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeKind, Element, ElementDelta, Model};

    fn id(s: &str) -> ElementId {
        s.parse().unwrap()
    }

    fn base_model() -> Model {
        let mut model = Model::new();
        model.insert(Element::new(id("business.service.y"), "Y")).unwrap();
        model.insert(Element::new(id("business.service.z"), "Z")).unwrap();
        model
    }

    fn changeset_on(model: &Model) -> Changeset {
        let snapshot = BaseSnapshot::from_model(model);
        let mut cs =
            Changeset::new("cs".parse().unwrap(), None, None, snapshot.hash, snapshot.manifest);
        cs.stage(
            id("business.service.y"),
            ChangeKind::Update {
                before: model.get(&id("business.service.y")).cloned(),
                after: ElementDelta::new().name("Y2"),
            },
        )
        .unwrap();
        cs
    }

    #[test]
    fn unchanged_model_has_no_drift() {
        let model = base_model();
        let cs = changeset_on(&model);

        let report = DriftDetector::check_against(&cs, &BaseSnapshot::from_model(&model));
        assert!(!report.has_drifted);
        assert!(report.changed_element_ids.is_empty());
        assert!(!report.overlaps());
    }

    #[test]
    fn unrelated_addition_is_drift_without_overlap() {
        let mut model = base_model();
        let cs = changeset_on(&model);
        model.insert(Element::new(id("business.service.x"), "X")).unwrap();

        let report = DriftDetector::check_against(&cs, &BaseSnapshot::from_model(&model));
        assert!(report.has_drifted);
        assert_eq!(
            report.changed_element_ids.iter().collect::<Vec<_>>(),
            vec![&id("business.service.x")]
        );
        assert!(!report.overlaps());
    }

    #[test]
    fn change_to_staged_target_overlaps() {
        let mut model = base_model();
        let cs = changeset_on(&model);
        model.get_mut(&id("business.service.y")).unwrap().name = "External".to_string();

        let report = DriftDetector::check_against(&cs, &BaseSnapshot::from_model(&model));
        assert!(report.overlaps());
        assert!(report.overlapping.contains(&id("business.service.y")));
    }

    #[test]
    fn deletion_is_reported() {
        let mut model = base_model();
        let cs = changeset_on(&model);
        model.remove(&id("business.service.z")).unwrap();

        let report = DriftDetector::check_against(&cs, &BaseSnapshot::from_model(&model));
        assert!(report.changed_element_ids.contains(&id("business.service.z")));
        assert!(!report.overlaps());
    }
}
